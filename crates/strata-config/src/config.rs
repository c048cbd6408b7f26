use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the configuration file inside a build directory
pub const CONFIG_FILE_NAME: &str = "strata.toml";

/// Environment variable that overrides the configuration file location
pub const CONFIG_ENV_VAR: &str = "STRATA_CONFIG";

/// Keys accepted by `get`/`set`, in display order
pub const CONFIG_KEYS: &[&str] = &[
    "src-dir",
    "build-dir",
    "blueprints",
    "bootstrap-manifest",
    "go-root",
    "go-compile",
    "go-link",
    "ninja",
];

/// Error type for configuration loading and saving
#[derive(Debug)]
pub enum ConfigError {
    /// Reading or writing the configuration file failed
    Io(PathBuf, std::io::Error),
    /// The configuration file is not valid TOML for this schema
    Parse(PathBuf, String),
    /// Serializing the configuration failed
    Serialize(String),
    /// A required value is neither configured nor discoverable
    Missing(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, err) => write!(f, "{}: {}", path.display(), err),
            ConfigError::Parse(path, msg) => {
                write!(f, "Failed to parse {}: {}", path.display(), msg)
            }
            ConfigError::Serialize(msg) => write!(f, "Failed to serialize config: {}", msg),
            ConfigError::Missing(key) => write!(
                f,
                "'{}' is not configured. Set it with `strata config set {} <value>`",
                key, key
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration for one build directory.
///
/// Unset values fall back to the user defaults file and then to discovery
/// (`which`, `GOROOT`).
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_dir: Option<String>,
    /// Root declarative description, relative to `src_dir` unless absolute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blueprints: Option<String>,
    /// Committed bootstrap manifest template in the source tree
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap_manifest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub go_root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub go_compile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub go_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ninja: Option<String>,
}

impl Config {
    /// Resolve the config file for a build directory.
    ///
    /// `STRATA_CONFIG` wins when set and non-empty so tests can run isolated.
    pub fn path(build_dir: &Path) -> PathBuf {
        if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
            let trimmed = env_path.trim();
            if !trimmed.is_empty() {
                return PathBuf::from(trimmed);
            }
        }
        build_dir.join(CONFIG_FILE_NAME)
    }

    /// Per-user defaults shared by every build directory
    pub fn user_defaults_path() -> Option<PathBuf> {
        #[cfg(not(target_os = "windows"))]
        {
            dirs::home_dir().map(|h| h.join(".config").join("strata").join(CONFIG_FILE_NAME))
        }

        #[cfg(target_os = "windows")]
        {
            dirs::config_dir().map(|c| c.join("strata").join(CONFIG_FILE_NAME))
        }
    }

    /// Load the configuration of a build directory layered over user defaults.
    pub fn load(build_dir: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_path(&Self::path(build_dir))?;
        if let Some(defaults_path) = Self::user_defaults_path() {
            // Defaults are best effort; a broken defaults file must not block a build.
            if let Ok(defaults) = Self::load_from_path(&defaults_path) {
                config.fill_from(&defaults);
            }
        }
        if config.build_dir.is_none() {
            config.build_dir = Some(build_dir.to_string_lossy().to_string());
        }
        Ok(config)
    }

    /// Load a config file, returning an empty config when it does not exist
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))
    }

    /// Save to the build directory's config file
    pub fn save(&self, build_dir: &Path) -> Result<PathBuf, ConfigError> {
        let path = Self::path(build_dir);
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io(parent.to_path_buf(), e))?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        fs::write(path, content).map_err(|e| ConfigError::Io(path.to_path_buf(), e))
    }

    /// Copy every value that is unset here from `other`
    pub fn fill_from(&mut self, other: &Config) {
        for key in CONFIG_KEYS {
            if self.get(key).is_none() {
                if let Some(value) = other.get(key) {
                    self.set(key, value);
                }
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "src-dir" => self.src_dir.clone(),
            "build-dir" => self.build_dir.clone(),
            "blueprints" => self.blueprints.clone(),
            "bootstrap-manifest" => self.bootstrap_manifest.clone(),
            "go-root" => self.go_root.clone(),
            "go-compile" => self.go_compile.clone(),
            "go-link" => self.go_link.clone(),
            "ninja" => self.ninja.clone(),
            _ => None,
        }
    }

    /// Set a value by key. Returns false for unknown keys.
    pub fn set(&mut self, key: &str, value: String) -> bool {
        let slot = match key {
            "src-dir" => &mut self.src_dir,
            "build-dir" => &mut self.build_dir,
            "blueprints" => &mut self.blueprints,
            "bootstrap-manifest" => &mut self.bootstrap_manifest,
            "go-root" => &mut self.go_root,
            "go-compile" => &mut self.go_compile,
            "go-link" => &mut self.go_link,
            "ninja" => &mut self.ninja,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    pub fn is_empty(&self) -> bool {
        CONFIG_KEYS.iter().all(|key| self.get(key).is_none())
    }

    pub fn values_iter(&self) -> Vec<(&'static str, String)> {
        CONFIG_KEYS
            .iter()
            .filter_map(|key| self.get(key).map(|value| (*key, value)))
            .collect()
    }

    pub fn src_dir(&self) -> Result<PathBuf, ConfigError> {
        self.src_dir
            .as_deref()
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing("src-dir"))
    }

    pub fn build_dir(&self) -> Result<PathBuf, ConfigError> {
        self.build_dir
            .as_deref()
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing("build-dir"))
    }

    /// Root description file, `Blueprints.toml` in the source dir by default
    pub fn blueprints_path(&self) -> Result<PathBuf, ConfigError> {
        let src_dir = self.src_dir()?;
        Ok(match self.blueprints.as_deref() {
            Some(path) => src_dir.join(path),
            None => src_dir.join("Blueprints.toml"),
        })
    }

    /// Committed bootstrap template, `build.ninja.in` in the source dir by default
    pub fn bootstrap_manifest_path(&self) -> Result<PathBuf, ConfigError> {
        let src_dir = self.src_dir()?;
        Ok(match self.bootstrap_manifest.as_deref() {
            Some(path) => src_dir.join(path),
            None => src_dir.join("build.ninja.in"),
        })
    }

    /// Path to the graph-execution engine, resolved on PATH when unset
    pub fn ninja_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ref path) = self.ninja {
            return Ok(PathBuf::from(path));
        }
        which::which("ninja").map_err(|_| ConfigError::Missing("ninja"))
    }
}
