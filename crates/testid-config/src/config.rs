//! Configuration management for testid

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Config files looked up in the working directory when no explicit file is given
const CONFIG_FILE_NAMES: [&str; 2] = ["testid.toml", ".testid.toml"];

/// Prefix for environment overrides, e.g. `TESTID__CACHE__ENABLED=false`
const ENV_PREFIX: &str = "TESTID__";

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Which directories and files are scanned
    #[serde(default)]
    pub scan: ScanConfig,
    /// Shape of the inserted attribute
    #[serde(default)]
    pub attribute: AttributeConfig,
    /// Element filters deciding which tags are wanted
    #[serde(default)]
    pub elements: ElementConfig,
    /// Identifier generation and duplicate policy
    #[serde(default)]
    pub ids: IdConfig,
    /// Change-detection cache
    #[serde(default)]
    pub cache: CacheConfig,
    /// Run mode switches
    #[serde(default)]
    pub run: RunConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Source tree selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Root directories to walk
    pub include_dirs: Vec<PathBuf>,
    /// Directories skipped during the walk, matched against the walked path
    pub exclude_dirs: Vec<PathBuf>,
    /// File extensions (without the dot) that are parsed
    pub extensions: Vec<String>,
}

/// Attribute rendering options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeConfig {
    /// Attribute carrying the identifier
    pub name: String,
    /// Indentation added in front of an attribute placed on its own line
    pub indentation: Indentation,
    /// Quote character around the identifier
    pub quotes: QuoteStyle,
}

/// Filters deciding whether a tag is wanted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementConfig {
    /// Element names eligible for insertion; empty means all
    #[serde(default)]
    pub include: Vec<String>,
    /// Element names never touched
    #[serde(default)]
    pub exclude: Vec<String>,
    /// A tag must carry at least one of these attributes; empty means no filter
    #[serde(default)]
    pub expected_attributes: Vec<String>,
    /// Refresh empty identifier values even on tags that are not wanted
    #[serde(default)]
    pub always_refresh_empty: bool,
}

/// Identifier generation options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdConfig {
    /// Generation strategy
    pub strategy: IdStrategy,
    /// Length of identifiers produced by the `short` strategy
    pub short_length: usize,
    /// Do not fail the run when duplicate identifiers are found
    pub allow_duplicates: bool,
}

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable the change-detection cache
    pub enabled: bool,
    /// Location of the cache file
    pub path: PathBuf,
}

/// Run mode switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Compute everything but write nothing
    pub dry_run: bool,
    /// Insert attributes into tags lacking one; when false only empty values are refreshed
    pub insert: bool,
}

/// Log output format
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format for development
    #[default]
    Pretty,
    /// Structured JSON format for log collection
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

/// Indentation unit for attributes placed on their own line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IndentationRepr", into = "IndentationRepr")]
pub enum Indentation {
    Tab,
    Spaces(u8),
}

/// Accepts both `indentation = 4` and `indentation = "tab"` / `"4"`
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum IndentationRepr {
    Spaces(u8),
    Named(String),
}

impl Indentation {
    /// The literal text of one indentation level
    pub fn unit(&self) -> String {
        match self {
            Indentation::Tab => "\t".to_string(),
            Indentation::Spaces(count) => " ".repeat(usize::from(*count)),
        }
    }
}

impl FromStr for Indentation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("tab") {
            return Ok(Indentation::Tab);
        }
        trimmed
            .parse::<u8>()
            .map(Indentation::Spaces)
            .map_err(|_| format!("invalid indentation '{}', expected 'tab' or a number of spaces", s))
    }
}

impl fmt::Display for Indentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Indentation::Tab => f.write_str("tab"),
            Indentation::Spaces(count) => write!(f, "{}", count),
        }
    }
}

impl TryFrom<IndentationRepr> for Indentation {
    type Error = String;

    fn try_from(repr: IndentationRepr) -> Result<Self, Self::Error> {
        match repr {
            IndentationRepr::Spaces(count) => Ok(Indentation::Spaces(count)),
            IndentationRepr::Named(name) => name.parse(),
        }
    }
}

impl From<Indentation> for IndentationRepr {
    fn from(indentation: Indentation) -> Self {
        match indentation {
            Indentation::Tab => IndentationRepr::Named("tab".to_string()),
            Indentation::Spaces(count) => IndentationRepr::Spaces(count),
        }
    }
}

/// Quote character used around identifiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStyle {
    #[default]
    Double,
    Single,
}

impl QuoteStyle {
    pub fn as_char(&self) -> char {
        match self {
            QuoteStyle::Double => '"',
            QuoteStyle::Single => '\'',
        }
    }
}

impl FromStr for QuoteStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "double" => Ok(QuoteStyle::Double),
            "single" => Ok(QuoteStyle::Single),
            other => Err(format!("invalid quotes '{}', expected 'double' or 'single'", other)),
        }
    }
}

/// How new identifiers are generated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// Random v4 UUID
    #[default]
    Uuid,
    /// Random lowercase alphanumeric code of `short_length` characters
    Short,
}

impl FromStr for IdStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "uuid" => Ok(IdStrategy::Uuid),
            "short" => Ok(IdStrategy::Short),
            other => Err(format!("invalid id generator '{}', expected 'uuid' or 'short'", other)),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            include_dirs: vec![PathBuf::from(".")],
            exclude_dirs: vec![PathBuf::from("node_modules")],
            extensions: vec!["js".to_string(), "jsx".to_string(), "tsx".to_string()],
        }
    }
}

impl Default for AttributeConfig {
    fn default() -> Self {
        Self {
            name: "data-testid".to_string(),
            indentation: Indentation::Tab,
            quotes: QuoteStyle::Double,
        }
    }
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            strategy: IdStrategy::Uuid,
            short_length: 8,
            allow_duplicates: false,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from(".add-testid-cache.json"),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            insert: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl AppConfig {
    /// Load configuration from config files and the environment
    ///
    /// Configuration is loaded in the following priority order (highest to lowest):
    /// 1. Environment variables (TESTID__*)
    /// 2. The explicit config file, or `testid.toml` / `.testid.toml` in the working directory
    /// 3. Default values
    ///
    /// Command-line flags are layered on top by the binary, so the result is not
    /// validated here; call [`AppConfig::validate`] once every layer is applied.
    pub fn load(explicit: Option<&Path>) -> ConfigResult<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Toml},
            Figment,
        };

        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

        match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound {
                        path: path.to_path_buf(),
                    });
                }
                tracing::debug!(path = %path.display(), "Loading TOML configuration");
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(path) = CONFIG_FILE_NAMES
                    .iter()
                    .map(Path::new)
                    .find(|path| path.exists())
                {
                    tracing::debug!(path = %path.display(), "Loading TOML configuration");
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        let figment = figment.merge(
            Env::prefixed(ENV_PREFIX)
                .split("__")
                .map(|k| k.as_str().to_lowercase().into()),
        );

        let config: AppConfig = figment
            .extract()
            .map_err(|e| ConfigError::load(e.to_string()))?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        let name = &self.attribute.name;
        if name.is_empty() {
            return Err(ConfigError::invalid("Attribute name cannot be empty"));
        }
        if name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '=' | '<' | '>' | '/' | '{' | '}'))
        {
            return Err(ConfigError::invalid(format!(
                "Attribute name '{}' is not a valid JSX attribute name",
                name
            )));
        }

        if self.scan.extensions.is_empty() {
            return Err(ConfigError::invalid(
                "At least one file extension must be configured",
            ));
        }
        if self.scan.include_dirs.is_empty() {
            return Err(ConfigError::invalid(
                "At least one include directory must be configured",
            ));
        }

        if self.ids.strategy == IdStrategy::Short && self.ids.short_length == 0 {
            return Err(ConfigError::invalid("Short identifier length cannot be 0"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::invalid(format!(
                "Invalid log level '{}', must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    /// Extensions normalized to `.ext` form for suffix matching
    pub fn dotted_extensions(&self) -> Vec<String> {
        self.scan
            .extensions
            .iter()
            .map(|ext| format!(".{}", ext.trim_start_matches('.')))
            .collect()
    }

    /// Whether the cache file should be read and written
    pub fn persists_cache(&self) -> bool {
        self.cache.enabled && !self.run.dry_run
    }
}
