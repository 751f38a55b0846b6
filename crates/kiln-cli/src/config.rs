use anyhow::{Context, Result};
use kiln_resolve::ResolverConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File searched for upward from the working directory
pub const CONFIG_FILE: &str = "kiln.toml";

/// The kiln configuration file structure (kiln.toml)
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct KilnConfig {
    /// Mods directories, relative to the config file
    pub mods: Vec<String>,

    /// Extra archives or directories loaded like classpath entries
    pub classpath: Vec<String>,

    /// Resolver tunables
    pub resolver: ResolverConfig,

    /// Builtin host and runtime mods
    pub host: Option<HostConfig>,

    /// Directory holding the config file
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// The host application and the runtime it runs on
#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    pub id: String,
    pub version: String,
    pub runtime_id: String,
    pub runtime_version: String,

    /// Oldest runtime the host supports
    #[serde(default)]
    pub min_runtime: Option<String>,
}

impl KilnConfig {
    /// Load configuration from kiln.toml, searching upward from the given directory
    pub fn load(start_dir: &Path) -> Result<Option<Self>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE);

            if config_path.exists() {
                let content = std::fs::read_to_string(&config_path)
                    .with_context(|| format!("Failed to read {}", config_path.display()))?;
                let mut config: KilnConfig = toml::from_str(&content)
                    .with_context(|| format!("Failed to parse {}", config_path.display()))?;
                config.base_dir = current;
                return Ok(Some(config));
            }

            if !current.pop() {
                return Ok(None);
            }
        }
    }

    /// Mods directories as absolute paths
    pub fn mods_dirs(&self) -> Vec<PathBuf> {
        self.mods.iter().map(|m| self.base_dir.join(m)).collect()
    }

    /// Classpath entries as absolute paths
    pub fn classpath_entries(&self) -> Vec<PathBuf> {
        self.classpath.iter().map(|c| self.base_dir.join(c)).collect()
    }
}
