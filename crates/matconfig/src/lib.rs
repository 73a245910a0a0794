use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use matgraph::{
    BackendCapabilityModel, BackendId, CapabilityError, ConflictPolicy, EngineSettings,
    LayoutOptions, NormalizeOptions, RequestedBackend, TextureRole, DEFAULT_CAPACITY,
    DEFAULT_MIN_TILES,
};
use serde::de::{self, Deserializer};
use serde::Deserialize;

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImportConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub backends: Backends,
    #[serde(default)]
    pub engine: Engine,
    #[serde(default)]
    pub cache: Cache,
    #[serde(default)]
    pub layout: LayoutOptions,
    #[serde(default)]
    pub classifier: ClassifierRules,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Backends {
    #[serde(default, deserialize_with = "deserialize_requested")]
    pub requested: RequestedBackend,
    #[serde(default = "default_priority")]
    pub priority: Vec<BackendId>,
    /// Host availability per backend; backends not listed are assumed present.
    #[serde(default, deserialize_with = "deserialize_availability")]
    pub available: BTreeMap<BackendId, bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Engine {
    #[serde(default)]
    pub strict: bool,
    #[serde(default = "default_min_tiles")]
    pub min_tiles: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Cache {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClassifierRules {
    #[serde(default, deserialize_with = "deserialize_keywords")]
    pub extra_keywords: BTreeMap<TextureRole, Vec<String>>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            backends: Backends::default(),
            engine: Engine::default(),
            cache: Cache::default(),
            layout: LayoutOptions::default(),
            classifier: ClassifierRules::default(),
        }
    }
}

impl Default for Backends {
    fn default() -> Self {
        Self {
            requested: RequestedBackend::Auto,
            priority: default_priority(),
            available: BTreeMap::new(),
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            strict: false,
            min_tiles: default_min_tiles(),
        }
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_capacity(),
        }
    }
}

fn default_version() -> u32 {
    1
}

fn default_priority() -> Vec<BackendId> {
    BackendId::ALL.to_vec()
}

fn default_min_tiles() -> usize {
    DEFAULT_MIN_TILES
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_true() -> bool {
    true
}

fn deserialize_requested<'de, D>(deserializer: D) -> Result<RequestedBackend, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(RequestedBackend::Auto),
        Some(raw) => raw.parse().map_err(de::Error::custom),
    }
}

fn deserialize_availability<'de, D>(deserializer: D) -> Result<BTreeMap<BackendId, bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, bool> = BTreeMap::deserialize(deserializer)?;
    let mut available = BTreeMap::new();
    for (name, flag) in raw {
        let id = name
            .parse::<BackendId>()
            .map_err(<D::Error as de::Error>::custom)?;
        available.insert(id, flag);
    }
    Ok(available)
}

fn deserialize_keywords<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<TextureRole, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, Vec<String>> = BTreeMap::deserialize(deserializer)?;
    let mut keywords: BTreeMap<TextureRole, Vec<String>> = BTreeMap::new();
    for (name, list) in raw {
        let role = name
            .parse::<TextureRole>()
            .map_err(<D::Error as de::Error>::custom)?;
        keywords.entry(role).or_default().extend(list);
    }
    Ok(keywords)
}

impl ImportConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: ImportConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Like `load`, but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match fs::metadata(path) {
            Ok(_) => Self::load(path),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.backends.priority.is_empty() {
            return Err(ConfigError::Invalid(
                "backends.priority must list at least one backend".into(),
            ));
        }
        let mut seen = BTreeSet::new();
        for id in &self.backends.priority {
            if !seen.insert(*id) {
                return Err(ConfigError::Invalid(format!(
                    "backends.priority lists '{id}' more than once"
                )));
            }
        }
        if let RequestedBackend::Backend(id) = self.backends.requested {
            if !seen.contains(&id) {
                return Err(ConfigError::Invalid(format!(
                    "backends.requested '{id}' is not in backends.priority"
                )));
            }
        }

        if self.engine.min_tiles == 0 {
            return Err(ConfigError::Invalid("engine.min_tiles must be >= 1".into()));
        }

        if self.cache.capacity == 0 {
            return Err(ConfigError::Invalid("cache.capacity must be >= 1".into()));
        }

        let layout = &self.layout;
        for (key, value) in [
            ("column_offset", layout.column_offset),
            ("row_spacing", layout.row_spacing),
            ("wrapper_offset", layout.wrapper_offset),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "layout.{key} must be a finite, non-negative number"
                )));
            }
        }

        for (role, keywords) in &self.classifier.extra_keywords {
            if !role.is_channel() {
                return Err(ConfigError::Invalid(
                    "classifier.extra_keywords cannot target 'unclassified'".into(),
                ));
            }
            if keywords.iter().any(|keyword| keyword.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "classifier.extra_keywords.{role} contains an empty keyword"
                )));
            }
        }

        Ok(())
    }

    pub fn is_available(&self, id: BackendId) -> bool {
        self.backends.available.get(&id).copied().unwrap_or(true)
    }

    /// Availability for every backend in the priority list.
    pub fn availability(&self) -> BTreeMap<BackendId, bool> {
        self.backends
            .priority
            .iter()
            .map(|id| (*id, self.is_available(*id)))
            .collect()
    }

    pub fn capability_model(&self) -> Result<BackendCapabilityModel, ConfigError> {
        let probe = self.availability();
        Ok(BackendCapabilityModel::with_priority(
            &self.backends.priority,
            &probe,
        )?)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            normalize: NormalizeOptions {
                policy: if self.engine.strict {
                    ConflictPolicy::Reject
                } else {
                    ConflictPolicy::PreferLargest
                },
                min_tiles: self.engine.min_tiles,
            },
            layout: self.layout,
            cache_enabled: self.cache.enabled,
            cache_capacity: self.cache.capacity,
            extra_keywords: self.classifier.extra_keywords.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1

[backends]
requested = "redshift"
priority = ["redshift", "materialx"]

[backends.available]
materialx = false

[engine]
strict = true
min_tiles = 3

[cache]
enabled = false
capacity = 64

[layout]
row_spacing = 1.5

[classifier.extra_keywords]
opacity = ["cutout", "stencil"]
"#;

    #[test]
    fn parses_sample_config() {
        let config = ImportConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(
            config.backends.requested,
            RequestedBackend::Backend(BackendId::Redshift)
        );
        assert_eq!(
            config.backends.priority,
            vec![BackendId::Redshift, BackendId::MaterialX]
        );
        assert!(!config.is_available(BackendId::MaterialX));
        assert!(config.is_available(BackendId::Redshift));
        assert_eq!(config.layout.row_spacing, 1.5);
        assert_eq!(config.layout.column_offset, 4.0);

        let settings = config.engine_settings();
        assert_eq!(settings.normalize.policy, ConflictPolicy::Reject);
        assert_eq!(settings.normalize.min_tiles, 3);
        assert!(!settings.cache_enabled);
        assert_eq!(settings.cache_capacity, 64);
        assert_eq!(
            settings.extra_keywords.get(&TextureRole::Opacity).map(Vec::len),
            Some(2)
        );
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = ImportConfig::from_toml_str("").expect("parse config");
        assert_eq!(config, ImportConfig::default());
        assert_eq!(config.backends.requested, RequestedBackend::Auto);
        assert_eq!(config.cache.capacity, 1000);
        assert_eq!(config.engine.min_tiles, 2);
    }

    #[test]
    fn capability_model_follows_priority_and_availability() {
        let config = ImportConfig::from_toml_str(SAMPLE).unwrap();
        let model = config.capability_model().unwrap();
        let report = model.report();
        assert_eq!(report.priority, vec![BackendId::Redshift, BackendId::MaterialX]);
        assert_eq!(report.available(), vec![BackendId::Redshift]);
    }

    #[test]
    fn rejects_duplicate_priority() {
        let err = ImportConfig::from_toml_str(
            r#"
[backends]
priority = ["materialx", "materialx"]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_requested_backend_outside_priority() {
        let err = ImportConfig::from_toml_str(
            r#"
[backends]
requested = "principled"
priority = ["materialx"]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_backend_name() {
        let err = ImportConfig::from_toml_str(
            r#"
[backends]
requested = "arnold"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_bad_version_and_zero_values() {
        for input in [
            "version = 2",
            "[engine]\nmin_tiles = 0",
            "[cache]\ncapacity = 0",
            "[layout]\nrow_spacing = -1.0",
            "[classifier.extra_keywords]\nunclassified = [\"x\"]",
            "[classifier.extra_keywords]\nnormal = [\" \"]",
        ] {
            let err = ImportConfig::from_toml_str(input).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{input}");
        }
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = ImportConfig::load_or_default(&path).unwrap();
        assert_eq!(config, ImportConfig::default());

        fs::write(&path, "[engine]\nstrict = true\n").unwrap();
        let config = ImportConfig::load_or_default(&path).unwrap();
        assert!(config.engine.strict);
    }
}
