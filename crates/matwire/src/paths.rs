//! Resolves where matwire reads its configuration from.
//!
//! Types:
//!
//! - `AppPaths` captures the resolved config directory and config file.
//!
//! Functions:
//!
//! - `AppPaths::discover` honours `MATWIRE_CONFIG_DIR`, then the platform
//!   config directory.
//! - `AppPaths::with_override` applies an explicit `--config` file.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;
use matconfig::CONFIG_FILE_NAME;

pub const ENV_CONFIG_DIR: &str = "MATWIRE_CONFIG_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "matwire";
const APPLICATION: &str = "matwire";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Flag,
    Environment,
    Platform,
}

impl ConfigSource {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Flag => "--config",
            Self::Environment => ENV_CONFIG_DIR,
            Self::Platform => "platform default",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
    config_file: PathBuf,
    source: ConfigSource,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        if let Some(dir) = env_override(ENV_CONFIG_DIR) {
            return Ok(Self::in_dir(dir, ConfigSource::Environment));
        }

        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;
        Ok(Self::in_dir(
            project_dirs.config_dir().to_path_buf(),
            ConfigSource::Platform,
        ))
    }

    pub fn with_override(self, config: Option<&Path>) -> Self {
        match config {
            Some(file) => Self {
                config_dir: file
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.config_dir.clone()),
                config_file: file.to_path_buf(),
                source: ConfigSource::Flag,
            },
            None => self,
        }
    }

    fn in_dir(config_dir: PathBuf, source: ConfigSource) -> Self {
        let config_file = config_dir.join(CONFIG_FILE_NAME);
        Self {
            config_dir,
            config_file,
            source,
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    pub fn source(&self) -> ConfigSource {
        self.source
    }
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.as_os_str().is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::sync::{Mutex, OnceLock};
    use tempfile::TempDir;

    fn env_lock() -> &'static Mutex<()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    struct EnvGuard {
        key: &'static str,
        previous: Option<OsString>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &Path) -> Self {
            let previous = env::var_os(key);
            env::set_var(key, value);
            Self { key, previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = self.previous.take() {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    #[test]
    fn env_override_takes_precedence() {
        let _guard = env_lock().lock().unwrap();
        let root = TempDir::new().unwrap();
        let config_dir = root.path().join("config");
        let _config_guard = EnvGuard::set(ENV_CONFIG_DIR, &config_dir);

        let paths = AppPaths::discover().unwrap();

        assert_eq!(paths.config_dir(), config_dir.as_path());
        assert_eq!(paths.config_file(), config_dir.join("config.toml").as_path());
        assert_eq!(paths.source(), ConfigSource::Environment);
    }

    #[test]
    fn explicit_file_beats_environment() {
        let _guard = env_lock().lock().unwrap();
        let root = TempDir::new().unwrap();
        let _config_guard = EnvGuard::set(ENV_CONFIG_DIR, root.path());
        let file = root.path().join("other/custom.toml");

        let paths = AppPaths::discover().unwrap().with_override(Some(&file));

        assert_eq!(paths.config_file(), file.as_path());
        assert_eq!(paths.config_dir(), root.path().join("other").as_path());
        assert_eq!(paths.source(), ConfigSource::Flag);
    }
}
