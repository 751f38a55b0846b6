//! Reading mod containers: zip archives held in memory and unpacked directories.
//!
//! Everything here is blocking and runs on the blocking thread pool.

use std::fs;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use zip::result::ZipError;
use zip::ZipArchive;

use crate::candidate::{ArchiveStore, ContentHash};
use crate::metadata::{MetadataError, ModMetadata};

/// Raw content of a mod container
#[derive(Debug, Clone)]
pub(crate) enum Container {
    Archive(Arc<[u8]>),
    Directory(PathBuf),
}

/// Result of opening one discovery item
#[derive(Debug)]
pub(crate) enum Loaded {
    /// A mod with a descriptor
    Mod {
        metadata: ModMetadata,
        container: Container,
    },
    /// An archive without a descriptor
    NoDescriptor,
    /// A directory without a descriptor, only usable as a classpath entry
    ClasspathOnly,
}

/// Why an item could not be opened
#[derive(Debug, thiserror::Error)]
pub(crate) enum LoadError {
    /// Unreadable or corrupt container; localized to this item
    #[error("{0}")]
    Corrupt(String),
    /// The descriptor exists but is invalid; a configuration error
    #[error(transparent)]
    Malformed(#[from] MetadataError),
}

impl From<io::Error> for LoadError {
    fn from(e: io::Error) -> Self {
        LoadError::Corrupt(e.to_string())
    }
}

impl From<ZipError> for LoadError {
    fn from(e: ZipError) -> Self {
        LoadError::Corrupt(format!("invalid archive: {}", e))
    }
}

/// A nested archive copied into the [`ArchiveStore`]
#[derive(Debug, Clone)]
pub(crate) struct Extracted {
    pub entry: String,
    pub name: String,
    pub hash: ContentHash,
    pub bytes: Arc<[u8]>,
}

fn open(bytes: Arc<[u8]>) -> Result<ZipArchive<Cursor<Arc<[u8]>>>, ZipError> {
    ZipArchive::new(Cursor::new(bytes))
}

/// Open a path: a directory or an archive file
pub(crate) fn load_path(path: &Path, descriptor_name: &str) -> Result<Loaded, LoadError> {
    if path.is_dir() {
        let descriptor = path.join(descriptor_name);
        if !descriptor.is_file() {
            return Ok(Loaded::ClasspathOnly);
        }
        let content = fs::read_to_string(&descriptor)?;
        return Ok(Loaded::Mod {
            metadata: ModMetadata::parse(&content)?,
            container: Container::Directory(path.to_path_buf()),
        });
    }

    let bytes: Arc<[u8]> = Arc::from(fs::read(path)?);
    load_archive(bytes, descriptor_name)
}

/// Open an in-memory archive and parse its descriptor
pub(crate) fn load_archive(bytes: Arc<[u8]>, descriptor_name: &str) -> Result<Loaded, LoadError> {
    let mut archive = open(bytes.clone())?;

    let content = match archive.by_name(descriptor_name) {
        Ok(mut file) => {
            let mut content = String::new();
            file.read_to_string(&mut content)?;
            content
        }
        Err(ZipError::FileNotFound) => return Ok(Loaded::NoDescriptor),
        Err(e) => return Err(e.into()),
    };

    Ok(Loaded::Mod {
        metadata: ModMetadata::parse(&content)?,
        container: Container::Archive(bytes),
    })
}

/// Read one entry of an in-memory archive, `None` if it does not exist
pub(crate) fn read_entry(bytes: Arc<[u8]>, entry: &str) -> io::Result<Option<Arc<[u8]>>> {
    let mut archive = open(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let mut file = match archive.by_name(entry) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
    };

    let mut content = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut content)?;
    Ok(Some(Arc::from(content)))
}

fn file_name(entry: &str) -> &str {
    entry.rsplit('/').next().unwrap_or(entry)
}

/// Copy nested archives of a container into the store.
///
/// Every entry is attempted; failures are reported per entry.
pub(crate) fn extract_nested(
    container: &Container,
    entries: &[String],
    store: &ArchiveStore,
) -> Vec<Result<Extracted, (String, String)>> {
    let mut archive = match container {
        Container::Archive(bytes) => match open(bytes.clone()) {
            Ok(archive) => Some(archive),
            Err(e) => {
                let reason = format!("invalid archive: {}", e);
                return entries.iter().map(|entry| Err((entry.clone(), reason.clone()))).collect();
            }
        },
        Container::Directory(_) => None,
    };

    entries
        .iter()
        .map(|entry| {
            let bytes: Arc<[u8]> = match (&mut archive, container) {
                (Some(archive), _) => {
                    let mut file = archive
                        .by_name(entry)
                        .map_err(|e| (entry.clone(), format!("cannot open nested entry: {}", e)))?;
                    let mut content = Vec::with_capacity(file.size() as usize);
                    file.read_to_end(&mut content)
                        .map_err(|e| (entry.clone(), e.to_string()))?;
                    Arc::from(content)
                }
                (None, Container::Directory(dir)) => Arc::from(
                    fs::read(dir.join(entry)).map_err(|e| (entry.clone(), e.to_string()))?,
                ),
                (None, Container::Archive(_)) => {
                    return Err((entry.clone(), "archive is not open".to_string()))
                }
            };

            let (name, hash) = store.insert(file_name(entry), bytes.clone());
            Ok(Extracted {
                entry: entry.clone(),
                name,
                hash,
                bytes,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_zip<B: AsRef<[u8]>>(files: &[(&str, B)]) -> Arc<[u8]> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, content) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_ref()).unwrap();
        }
        Arc::from(zip.finish().unwrap().into_inner())
    }

    #[test]
    fn test_load_archive_with_descriptor() {
        let bytes = build_zip(&[(
            "kiln.mod.json",
            br#"{"schemaVersion": 1, "id": "alpha", "version": "1.0"}"#,
        )]);

        match load_archive(bytes, "kiln.mod.json").unwrap() {
            Loaded::Mod { metadata, container } => {
                assert_eq!(metadata.id, "alpha");
                assert!(matches!(container, Container::Archive(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_load_archive_without_descriptor() {
        let bytes = build_zip(&[("readme.txt", b"hi")]);
        assert!(matches!(load_archive(bytes, "kiln.mod.json").unwrap(), Loaded::NoDescriptor));
    }

    #[test]
    fn test_corrupt_and_malformed() {
        let garbage: Arc<[u8]> = Arc::from(&b"not a zip"[..]);
        assert!(matches!(load_archive(garbage, "kiln.mod.json"), Err(LoadError::Corrupt(_))));

        let broken = build_zip(&[("kiln.mod.json", b"{ nope")]);
        assert!(matches!(load_archive(broken, "kiln.mod.json"), Err(LoadError::Malformed(_))));
    }

    #[test]
    fn test_extract_nested() {
        let inner = build_zip(&[("kiln.mod.json", br#"{"id": "inner", "version": "1"}"#)]);
        let outer = build_zip(&[("jars/inner.jar", &inner[..])]);
        let store = ArchiveStore::new();

        let results = extract_nested(
            &Container::Archive(outer),
            &["jars/inner.jar".to_string(), "jars/missing.jar".to_string()],
            &store,
        );

        let extracted = results[0].as_ref().unwrap();
        assert!(extracted.name.starts_with("inner-"));
        assert_eq!(&*extracted.bytes, &*inner);
        assert!(store.contains(&extracted.name));
        assert_eq!(results[1].as_ref().unwrap_err().0, "jars/missing.jar");
    }

    #[test]
    fn test_read_entry() {
        let outer = build_zip(&[("a/b.jar", b"bytes")]);
        assert_eq!(read_entry(outer.clone(), "a/b.jar").unwrap().as_deref(), Some(&b"bytes"[..]));
        assert!(read_entry(outer, "a/c.jar").unwrap().is_none());
    }

    #[test]
    fn test_directory_without_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_path(dir.path(), "kiln.mod.json").unwrap(),
            Loaded::ClasspathOnly
        ));

        fs::write(
            dir.path().join("kiln.mod.json"),
            r#"{"schemaVersion": 1, "id": "local", "version": "0.1"}"#,
        )
        .unwrap();
        assert!(matches!(load_path(dir.path(), "kiln.mod.json").unwrap(), Loaded::Mod { .. }));
    }
}
