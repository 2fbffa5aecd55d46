use anyhow::{Context, Result};
use farmstead_world::{CropRegistry, FarmSettings, DEFAULT_UNLOAD_INTERVAL_TICKS};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "config/farm.toml";
const DEFAULT_STORE_DIR: &str = "farm-data";

/// Where a loaded config came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigSource {
    File,
    Missing,
    Broken,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FarmConfig {
    /// Milliseconds between ticks (20 TPS by default).
    pub tick_millis: u64,
    /// Ticks between sweeps that drop passive chunks.
    pub unload_interval_ticks: u64,
    /// Directory holding region files and the world index.
    pub store_dir: PathBuf,
    /// Growth duration per crop key, in milliseconds. Negative values clamp to 0.
    pub crops: BTreeMap<String, i64>,
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            tick_millis: 50,
            unload_interval_ticks: DEFAULT_UNLOAD_INTERVAL_TICKS,
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            crops: BTreeMap::new(),
        }
    }
}

impl FarmConfig {
    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        Self::read(path).0
    }

    /// Load, add any crop kinds the file is missing, and write it back when
    /// it changed or did not exist. A file that fails to read or parse is
    /// left untouched.
    pub fn load_or_create(path: &Path, registry: &CropRegistry) -> Result<Self> {
        let (mut config, source) = Self::read(path);
        let filled = config.fill_missing_crops(registry);
        let write = match source {
            ConfigSource::Missing => true,
            ConfigSource::File => filled > 0,
            ConfigSource::Broken => {
                warn!(
                    "Not rewriting {} after a failed load. Fix or remove it to regenerate",
                    path.display()
                );
                false
            }
        };
        if !write {
            return Ok(config);
        }
        config
            .save_to_path(path)
            .with_context(|| format!("failed to write farm config {}", path.display()))?;
        Ok(config)
    }

    fn read(path: &Path) -> (Self, ConfigSource) {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<FarmConfig>(&contents) {
                Ok(cfg) => (cfg, ConfigSource::File),
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    (FarmConfig::default(), ConfigSource::Broken)
                }
            },
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to read {}: {err}. Using defaults", path.display());
                    (FarmConfig::default(), ConfigSource::Broken)
                } else {
                    info!("Farm config not found at {}. Creating it", path.display());
                    (FarmConfig::default(), ConfigSource::Missing)
                }
            }
        }
    }

    /// Insert the registry's current duration for every kind without an entry.
    /// Returns how many entries were added.
    pub fn fill_missing_crops(&mut self, registry: &CropRegistry) -> usize {
        let mut added = 0;
        for (_, kind) in registry.iter() {
            if !self.crops.contains_key(kind.key) {
                let duration = i64::try_from(kind.table.duration()).unwrap_or(i64::MAX);
                self.crops.insert(kind.key.to_string(), duration);
                added += 1;
            }
        }
        added
    }

    /// Push configured durations into the registry. Unknown keys are skipped.
    pub fn apply(&self, registry: &mut CropRegistry) {
        for (key, &millis) in &self.crops {
            let Some(id) = registry.by_key(key) else {
                warn!(crop = %key, "unknown crop kind in config, ignoring");
                continue;
            };
            let millis = u64::try_from(millis).unwrap_or(0);
            registry.set_duration(id, millis);
        }
    }

    pub fn settings(&self) -> FarmSettings {
        FarmSettings {
            unload_interval_ticks: self.unload_interval_ticks,
        }
    }

    /// Save configuration to an explicit path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, toml)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use farmstead_testkit::TempDir;
    use farmstead_world::DEFAULT_DURATION_MS;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let cfg: FarmConfig = toml::from_str("tick_millis = 10").expect("parses");
        assert_eq!(cfg.tick_millis, 10);
        assert_eq!(cfg.unload_interval_ticks, DEFAULT_UNLOAD_INTERVAL_TICKS);
        assert!(cfg.crops.is_empty());
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let dir = TempDir::new("config_broken").expect("temp dir");
        let path = dir.join("farm.toml");
        fs::write(&path, "tick_millis = \"fast\"").expect("write config");
        assert_eq!(FarmConfig::load_from_path(&path), FarmConfig::default());
    }

    #[test]
    fn broken_file_is_not_overwritten() {
        let dir = TempDir::new("config_keep").expect("temp dir");
        let path = dir.join("farm.toml");
        let broken = "[crops]\nwheat = \"slow\"\n";
        fs::write(&path, broken).expect("write config");
        let registry = CropRegistry::standard();

        let cfg = FarmConfig::load_or_create(&path, &registry).expect("config loads");
        assert_eq!(cfg.crops.len(), registry.len());
        assert_eq!(fs::read_to_string(&path).expect("read back"), broken);
    }

    #[test]
    fn missing_file_is_created_with_every_kind() {
        let dir = TempDir::new("config_create").expect("temp dir");
        let path = dir.join("nested").join("farm.toml");
        let registry = CropRegistry::standard();

        let cfg = FarmConfig::load_or_create(&path, &registry).expect("config created");
        assert!(path.exists());
        assert_eq!(cfg.crops.len(), registry.len());
        assert_eq!(cfg.crops.get("wheat"), Some(&(DEFAULT_DURATION_MS as i64)));

        let reread = FarmConfig::load_from_path(&path);
        assert_eq!(reread, cfg);
    }

    #[test]
    fn missing_kinds_are_written_back() {
        let dir = TempDir::new("config_fill").expect("temp dir");
        let path = dir.join("farm.toml");
        fs::write(&path, "[crops]\nwheat = 1000\n").expect("write config");
        let registry = CropRegistry::standard();

        let cfg = FarmConfig::load_or_create(&path, &registry).expect("config loads");
        assert_eq!(cfg.crops.get("wheat"), Some(&1000));
        let on_disk = fs::read_to_string(&path).expect("read back");
        assert!(on_disk.contains("melon"));
        assert_eq!(FarmConfig::load_from_path(&path).crops.len(), registry.len());
    }

    #[test]
    fn durations_apply_and_negative_values_clamp() {
        let mut registry = CropRegistry::standard();
        let mut cfg = FarmConfig::default();
        cfg.crops.insert("wheat".into(), 70_000);
        cfg.crops.insert("carrot".into(), -5);
        cfg.crops.insert("turnip".into(), 1);
        cfg.apply(&mut registry);

        let wheat = registry.get(registry.by_key("wheat").unwrap()).unwrap();
        assert_eq!(wheat.table.duration(), 70_000);
        assert_eq!(wheat.table.first_stage().time, 10_000);
        let carrot = registry.get(registry.by_key("carrot").unwrap()).unwrap();
        assert_eq!(carrot.table.duration(), 0);
    }

    #[test]
    fn settings_carry_unload_interval() {
        let cfg = FarmConfig {
            unload_interval_ticks: 20,
            ..FarmConfig::default()
        };
        assert_eq!(cfg.settings().unload_interval_ticks, 20);
    }
}
