//! # PMOPlayer configuration
//!
//! One YAML document shared by every crate of the workspace:
//!
//! - defaults embedded at build time (`pmoplayer.yaml`)
//! - overridden by `<config dir>/config.yaml`
//! - overridden by `PMOPLAYER_CONFIG__SECTION__KEY=value` variables
//!
//! Keys are case-insensitive. Every setter writes the whole document back to
//! disk. Crates add typed accessors for their own section through extension
//! traits on [`Config`] (for instance `pmoplayer::PlayerConfigExt`).
//!
//! ```no_run
//! use pmoconfig::get_config;
//!
//! let config = get_config();
//! let level = config.get_log_min_level()?;
//! config.set_log_enable_console(false)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

const DEFAULT_CONFIG: &str = include_str!("pmoplayer.yaml");

const CONFIG_DIR_NAME: &str = ".pmoplayer";
const CONFIG_FILE_NAME: &str = "config.yaml";
const ENV_CONFIG_DIR: &str = "PMOPLAYER_CONFIG";
const ENV_PREFIX: &str = "PMOPLAYER_CONFIG__";

const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load PMOPlayer configuration"));
}

/// Returns the process-wide configuration, loaded on first use.
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<bool> {
            Ok(self
                .get_value($path)
                .ok()
                .and_then(|v| v.as_bool())
                .unwrap_or($default))
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Loaded configuration document and the file it is saved to.
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: PathBuf,
    data: Mutex<Value>,
}

impl Config {
    /// Resolves, creates and checks the configuration directory.
    ///
    /// Lookup order: `directory` when not empty, `$PMOPLAYER_CONFIG`,
    /// `./.pmoplayer` if it exists, `~/.pmoplayer` if it exists, and finally
    /// `./.pmoplayer`.
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir = Self::find_config_dir(directory);
        Self::ensure_writable_dir(Path::new(&dir))?;
        Ok(dir)
    }

    fn find_config_dir(directory: &str) -> String {
        if !directory.is_empty() {
            return directory.to_string();
        }

        if let Ok(from_env) = env::var(ENV_CONFIG_DIR) {
            debug!(env_var = ENV_CONFIG_DIR, path = %from_env, "Config directory from environment");
            return from_env;
        }

        if Path::new(CONFIG_DIR_NAME).is_dir() {
            return CONFIG_DIR_NAME.to_string();
        }

        dirs::home_dir()
            .map(|home| home.join(CONFIG_DIR_NAME))
            .filter(|candidate| candidate.is_dir())
            .map(|candidate| candidate.to_string_lossy().into_owned())
            .unwrap_or_else(|| CONFIG_DIR_NAME.to_string())
    }

    fn ensure_writable_dir(path: &Path) -> Result<()> {
        fs::create_dir_all(path)
            .with_context(|| format!("Cannot create config directory {}", path.display()))?;

        if !path.is_dir() {
            return Err(anyhow!("Config path {} is not a directory", path.display()));
        }

        let probe = path.join(".write_test");
        fs::write(&probe, b"probe")
            .with_context(|| format!("Config directory {} is not writable", path.display()))?;
        fs::remove_file(&probe)?;
        Ok(())
    }

    /// Loads the configuration of `directory` (empty for the default lookup)
    /// and writes the merged result back to its `config.yaml`.
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        let path = Path::new(&config_dir).join(CONFIG_FILE_NAME);
        info!(config_file = %path.display(), "Loading configuration");

        let mut document: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        match fs::read_to_string(&path) {
            Ok(text) => {
                let user: Value = serde_yaml::from_str(&text)
                    .with_context(|| format!("Invalid YAML in {}", path.display()))?;
                merge_yaml(&mut document, &user);
            }
            Err(_) => info!("No config file yet, starting from embedded defaults"),
        }

        let mut document = lower_keys(document);
        apply_env_overrides(&mut document, env::vars());

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(document),
        };
        config.save()?;
        Ok(config)
    }

    pub fn directory(&self) -> &str {
        &self.config_dir
    }

    fn lock(&self) -> Result<MutexGuard<'_, Value>> {
        self.data.lock().map_err(|_| anyhow!("Config lock poisoned"))
    }

    pub fn save(&self) -> Result<()> {
        let text = {
            let guard = self.lock()?;
            serde_yaml::to_string(&*guard)?
        };
        fs::write(&self.path, text)
            .with_context(|| format!("Cannot write {}", self.path.display()))
    }

    /// Sets the value at `path`, creating intermediate sections, then saves.
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut guard = self.lock()?;
            insert_at(&mut guard, path, value)?;
        }
        self.save()
    }

    /// Value at `path`, or an error naming the first missing key.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let guard = self.lock()?;
        let value = lookup(&guard, path)?.clone();
        Ok(value)
    }

    impl_bool_config!(
        get_log_enable_console,
        set_log_enable_console,
        &["host", "logger", "enable_console"],
        DEFAULT_LOG_ENABLE_CONSOLE
    );

    pub fn get_log_min_level(&self) -> Result<String> {
        Ok(self
            .get_value(&["host", "logger", "min_level"])
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_LOG_MIN_LEVEL.to_string()))
    }

    pub fn set_log_min_level(&self, level: String) -> Result<()> {
        self.set_value(&["host", "logger", "min_level"], Value::String(level))
    }
}

fn key(name: &str) -> Value {
    Value::String(name.to_lowercase())
}

fn lookup<'a>(document: &'a Value, path: &[&str]) -> Result<&'a Value> {
    path.iter().enumerate().try_fold(document, |node, (depth, name)| {
        let Value::Mapping(map) = node else {
            return Err(anyhow!("{} is not a section", path[..depth].join(".")));
        };
        map.get(&key(name))
            .ok_or_else(|| anyhow!("Path {} does not exist", path[..=depth].join(".")))
    })
}

fn insert_at(document: &mut Value, path: &[&str], value: Value) -> Result<()> {
    let Some((last, parents)) = path.split_last() else {
        *document = value;
        return Ok(());
    };

    let mut node = document;
    for name in parents {
        let Value::Mapping(map) = node else {
            return Err(anyhow!("Cannot set {}: {} is not a section", path.join("."), name));
        };
        node = map
            .entry(key(name))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
    }

    match node {
        Value::Mapping(map) => {
            map.insert(key(last), value);
            Ok(())
        }
        _ => Err(anyhow!("Cannot set {}: parent is not a section", path.join("."))),
    }
}

/// Applies `PMOPLAYER_CONFIG__A__B=value` pairs. Values are parsed as YAML
/// so numbers and booleans keep their type.
fn apply_env_overrides(document: &mut Value, vars: impl IntoIterator<Item = (String, String)>) {
    for (name, raw) in vars {
        let Some(stripped) = name.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let path: Vec<&str> = stripped.split("__").collect();
        let value = parse_env_value(&raw);
        if let Err(err) = insert_at(document, &path, value) {
            debug!(variable = %name, "Ignoring override: {}", err);
        }
    }
}

fn parse_env_value(raw: &str) -> Value {
    serde_yaml::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn lower_keys(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| {
                    let k = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    (k, lower_keys(v))
                })
                .collect(),
        ),
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(lower_keys).collect()),
        other => other,
    }
}

/// Recursively merges `overlay` into `base`. Sections merge key by key;
/// scalars and sequences are replaced.
fn merge_yaml(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (k, v) in overlay_map {
                match base_map.get_mut(k) {
                    Some(existing) => merge_yaml(existing, v),
                    None => {
                        base_map.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (slot, v) => *slot = v.clone(),
    }
}
