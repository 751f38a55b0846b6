//! End-to-end resolution tests
//!
//! Mods are written as archives into a temporary mods directory and resolved
//! through [`ModResolver`] together with builtin host mods.

use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use kiln_resolve::{
    BuiltinSource, CandidateSource, DirectorySource, ModLocation, ModResolver, ResolveError, ResolverConfig, Warning,
};
use kiln_semver::Version;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

fn build_zip(files: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, content) in files {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

fn host() -> Box<dyn CandidateSource> {
    Box::new(BuiltinSource::host("game", v("1.20.1"), "java", v("21"), Some(v("17"))))
}

fn mods(dir: &Path) -> Box<dyn CandidateSource> {
    Box::new(DirectorySource::new(dir))
}

#[tokio::test]
async fn test_resolve_with_nested_library() {
    let dir = TempDir::new().unwrap();
    let lib = build_zip(&[
        (
            "kiln.mod.json",
            br#"{"schemaVersion": 1, "id": "lib", "version": "2.1.0"}"#.to_vec(),
        ),
        ("lib/Api.class", b"api".to_vec()),
    ]);
    let app = build_zip(&[
        (
            "kiln.mod.json",
            br#"{
                "schemaVersion": 1,
                "id": "app",
                "version": "1.0.0",
                "depends": {"game": ">=1.20", "lib": "^2.0"},
                "nested": [{"file": "META-INF/jars/lib.jar"}]
            }"#
            .to_vec(),
        ),
        ("META-INF/jars/lib.jar", lib.clone()),
    ]);
    fs::write(dir.path().join("app.jar"), &app).unwrap();

    let resolver = ModResolver::new(ResolverConfig::default());
    let resolved = resolver.resolve(&[host(), mods(dir.path())], &[]).await.unwrap();

    let mut identifiers: Vec<&str> = resolved.mods().map(|r| r.identifier()).collect();
    identifiers.sort();
    assert_eq!(identifiers, vec!["app", "game", "java", "lib"]);
    assert!(resolved.warnings().is_empty());

    let lib_record = resolved.get("lib").unwrap();
    assert!(matches!(lib_record.location, ModLocation::Stored { .. }));
    let bytes = resolved.read_content(lib_record.id).unwrap().unwrap();
    assert_eq!(&bytes[..], &lib[..]);

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    let mut class = String::new();
    archive.by_name("lib/Api.class").unwrap().read_to_string(&mut class).unwrap();
    assert_eq!(class, "api");

    assert!(resolved.read_content(resolved.get("game").unwrap().id).unwrap().is_none());
}

#[tokio::test]
async fn test_unresolvable_reports_fix() {
    let dir = TempDir::new().unwrap();
    let app = build_zip(&[(
        "kiln.mod.json",
        br#"{"schemaVersion": 1, "id": "app", "version": "1.0.0", "depends": {"game": ">=1.21"}}"#.to_vec(),
    )]);
    fs::write(dir.path().join("app.jar"), &app).unwrap();

    let resolver = ModResolver::new(ResolverConfig::default());
    let error = resolver.resolve(&[host(), mods(dir.path())], &[]).await.unwrap_err();

    let ResolveError::Unresolvable(failure) = error else {
        panic!("expected an unresolvable mod set");
    };
    assert_eq!(failure.explanations.len(), 1);
    assert_eq!(failure.explanations[0].dependency.target, "game");

    let report = failure.to_string();
    assert!(report.starts_with("Unable to resolve the mod set:"));
    assert!(report.contains("Mod 'app' 1.0.0 requires version 1.21 or later of 'game'"));
    assert!(report.contains("A potential solution has been determined:"));
}

#[tokio::test]
async fn test_soft_constraints_become_warnings() {
    let dir = TempDir::new().unwrap();
    let app = build_zip(&[(
        "kiln.mod.json",
        br#"{
            "schemaVersion": 1,
            "id": "app",
            "version": "1.0.0",
            "recommends": {"extras": "*"},
            "conflicts": {"other": "*"}
        }"#
        .to_vec(),
    )]);
    let other = build_zip(&[(
        "kiln.mod.json",
        br#"{"schemaVersion": 1, "id": "other", "version": "0.3.0"}"#.to_vec(),
    )]);
    fs::write(dir.path().join("app.jar"), &app).unwrap();
    fs::write(dir.path().join("other.jar"), &other).unwrap();

    let resolver = ModResolver::new(ResolverConfig::default());
    let resolved = resolver.resolve(&[mods(dir.path())], &[]).await.unwrap();

    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved.warnings().len(), 2);
    assert!(resolved
        .warnings()
        .iter()
        .any(|w| matches!(w, Warning::MissingRecommendation { dependency, .. } if dependency.target == "extras")));
    assert!(resolved
        .warnings()
        .iter()
        .any(|w| matches!(w, Warning::Conflict { conflicting, .. } if conflicting.identifier == "other")));
    assert!(resolved.describe_warnings().contains("conflicts with any version of 'other', but 0.3.0 is present!"));
}

#[tokio::test]
async fn test_discovery_failures_do_not_abort_resolution() {
    let dir = TempDir::new().unwrap();
    let app = build_zip(&[(
        "kiln.mod.json",
        br#"{"schemaVersion": 1, "id": "app", "version": "1.0.0"}"#.to_vec(),
    )]);
    fs::write(dir.path().join("app.jar"), &app).unwrap();
    fs::write(dir.path().join("truncated.jar"), &app[..app.len() / 2]).unwrap();

    let resolver = ModResolver::new(ResolverConfig::default());
    let resolved = resolver.resolve(&[mods(dir.path())], &[]).await.unwrap();

    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved.failures().len(), 1);
}

#[tokio::test]
async fn test_runtime_too_old() {
    let resolver = ModResolver::new(ResolverConfig::default());
    let sources: Vec<Box<dyn CandidateSource>> = vec![Box::new(BuiltinSource::host(
        "game",
        v("1.20.1"),
        "java",
        v("11"),
        Some(v("17")),
    ))];

    let error = resolver.resolve(&sources, &[]).await.unwrap_err();
    let ResolveError::Unresolvable(failure) = error else {
        panic!("expected an unresolvable mod set");
    };
    let fix = failure.fix.as_ref().unwrap();
    assert_eq!(fix.replacements.len(), 1);
    assert_eq!(fix.replacements[0].new.version, v("17"));
}
