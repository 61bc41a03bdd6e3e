use crate::error::{DeckError, Result};
use crate::paths;
use crate::types::Target;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// SagaConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaConfig {
    /// Wait after the last setup effect before reporting completion; some
    /// effects (display modes, window placement) land asynchronously.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_settle_delay_ms() -> u64 {
    1000
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl SagaConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// DependencyConfig
// ---------------------------------------------------------------------------

/// Where the local dependency probe looks. A leading `~/` is expanded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyConfig {
    #[serde(default = "default_script_source_dir")]
    pub script_source_dir: String,
    #[serde(default = "default_script_install_dir")]
    pub script_install_dir: String,
    #[serde(default = "default_package_dirs")]
    pub package_dirs: Vec<String>,
    #[serde(default = "default_preset_dir")]
    pub preset_dir: String,
}

fn default_script_source_dir() -> String {
    "~/homebrew/plugins/deckpipe/scripts".to_string()
}

fn default_script_install_dir() -> String {
    "~/.local/share/kwin/scripts".to_string()
}

fn default_package_dirs() -> Vec<String> {
    vec![
        "/var/lib/flatpak/app".to_string(),
        "~/.local/share/flatpak/app".to_string(),
    ]
}

fn default_preset_dir() -> String {
    "~/.config/deckpipe/presets".to_string()
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            script_source_dir: default_script_source_dir(),
            script_install_dir: default_script_install_dir(),
            package_dirs: default_package_dirs(),
            preset_dir: default_preset_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_target")]
    pub default_target: Target,
    #[serde(default)]
    pub saga: SagaConfig,
    #[serde(default)]
    pub dependencies: DependencyConfig,
}

fn default_version() -> u32 {
    1
}

fn default_target() -> Target {
    Target::Primary
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            default_target: default_target(),
            saga: SagaConfig::default(),
            dependencies: DependencyConfig::default(),
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(DeckError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Like [`Config::load`], but an absent file yields the defaults.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        match Self::load(root) {
            Err(DeckError::NotInitialized) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.saga.settle_delay_ms > 30_000 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "saga.settle_delay_ms={} (>30000 is unusual)",
                    self.saga.settle_delay_ms
                ),
            });
        }

        let deps = &self.dependencies;
        for (name, value) in [
            ("script_source_dir", &deps.script_source_dir),
            ("script_install_dir", &deps.script_install_dir),
            ("preset_dir", &deps.preset_dir),
        ] {
            if value.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("dependencies.{name} is empty"),
                });
            }
        }

        if !deps.script_source_dir.trim().is_empty()
            && deps.script_source_dir == deps.script_install_dir
        {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "dependencies.script_source_dir and script_install_dir are the same \
                          directory; missing scripts can never be installed"
                    .to_string(),
            });
        }

        if deps.package_dirs.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "dependencies.package_dirs is empty; every package will be reported \
                          missing"
                    .to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.default_target, Target::Primary);
        assert_eq!(parsed.saga.settle_delay_ms, 1000);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let yaml = "version: 1\nsaga:\n  settle_delay_ms: 250\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.saga.settle_delay(), Duration::from_millis(250));
        assert_eq!(cfg.dependencies.package_dirs.len(), 2);
        assert_eq!(cfg.default_target, Target::Primary);
    }

    #[test]
    fn load_missing_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(DeckError::NotInitialized)
        ));
        let cfg = Config::load_or_default(dir.path()).unwrap();
        assert_eq!(cfg.version, 1);
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::default();
        cfg.default_target = Target::Secondary;
        cfg.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.default_target, Target::Secondary);
    }

    #[test]
    fn validate_default_has_no_warnings() {
        assert!(Config::default().validate().is_empty());
    }

    #[test]
    fn validate_long_settle_delay() {
        let mut cfg = Config::default();
        cfg.saga.settle_delay_ms = 60_000;
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("settle_delay_ms=60000")));
    }

    #[test]
    fn validate_same_script_dirs() {
        let mut cfg = Config::default();
        cfg.dependencies.script_install_dir = cfg.dependencies.script_source_dir.clone();
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.message.contains("same")));
    }

    #[test]
    fn validate_empty_preset_dir_is_error() {
        let mut cfg = Config::default();
        cfg.dependencies.preset_dir = String::new();
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("preset_dir")));
    }
}
