//! Command line surface; every flag overrides the loaded configuration

use clap::Parser;
use std::path::PathBuf;
use testid_config::{AppConfig, IdStrategy, Indentation, QuoteStyle};

/// The main CLI struct.
#[derive(Parser, Debug)]
#[command(name = "testid")]
#[command(about = "Insert unique test identifiers into JSX/TSX tags, skipping unchanged files")]
#[command(version)]
pub struct Cli {
    /// Directories to scan
    #[arg(short = 'i', long, num_args = 1.., value_name = "DIR")]
    pub include_dirs: Vec<PathBuf>,

    /// Directory names or paths to skip
    #[arg(short = 'e', long, num_args = 1.., value_name = "DIR")]
    pub exclude_dirs: Vec<PathBuf>,

    /// Attribute carrying the identifier
    #[arg(short = 'n', long, value_name = "NAME")]
    pub id_name: Option<String>,

    /// File extensions to scan, without the dot
    #[arg(long = "ext", num_args = 1.., value_delimiter = ',', value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Indentation of attributes placed on their own line: `tab` or a number of spaces
    #[arg(long, value_name = "tab|N")]
    pub indentation: Option<Indentation>,

    /// Quote character around identifiers: `double` or `single`
    #[arg(long, value_name = "double|single")]
    pub quotes: Option<QuoteStyle>,

    /// Cache file path
    #[arg(long = "cache", value_name = "PATH")]
    pub cache_path: Option<PathBuf>,

    /// Neither read nor write the cache
    #[arg(long)]
    pub no_cache: bool,

    /// Report duplicate identifiers without failing
    #[arg(long)]
    pub allow_duplicates: bool,

    /// Show what would change without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Only refresh empty identifier values; never insert new attributes
    #[arg(long)]
    pub no_insert: bool,

    /// Identifier generator: `uuid` or `short`
    #[arg(long, value_name = "uuid|short")]
    pub id_generator: Option<IdStrategy>,

    /// Length of `short` identifiers
    #[arg(long, value_name = "N")]
    pub id_length: Option<usize>,

    /// Only these elements get identifiers
    #[arg(long, num_args = 1.., value_delimiter = ',', value_name = "NAME")]
    pub include_elements: Vec<String>,

    /// These elements never get identifiers
    #[arg(long, num_args = 1.., value_delimiter = ',', value_name = "NAME")]
    pub exclude_elements: Vec<String>,

    /// Only elements carrying at least one of these attributes get identifiers
    #[arg(long, num_args = 1.., value_delimiter = ',', value_name = "NAME")]
    pub expected_attributes: Vec<String>,

    /// Refresh empty identifier values on every element, wanted or not
    #[arg(long)]
    pub refresh_empty: bool,

    /// Configuration file (default: testid.toml or .testid.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn or error
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Layer the flags that were given on top of `config`
    pub fn apply(&self, config: &mut AppConfig) {
        if !self.include_dirs.is_empty() {
            config.scan.include_dirs = self.include_dirs.clone();
        }
        if !self.exclude_dirs.is_empty() {
            config.scan.exclude_dirs = self.exclude_dirs.clone();
        }
        if !self.extensions.is_empty() {
            config.scan.extensions = self.extensions.clone();
        }

        if let Some(name) = &self.id_name {
            config.attribute.name = name.clone();
        }
        if let Some(indentation) = self.indentation {
            config.attribute.indentation = indentation;
        }
        if let Some(quotes) = self.quotes {
            config.attribute.quotes = quotes;
        }

        if let Some(path) = &self.cache_path {
            config.cache.path = path.clone();
        }
        if self.no_cache {
            config.cache.enabled = false;
        }

        if let Some(strategy) = self.id_generator {
            config.ids.strategy = strategy;
        }
        if let Some(length) = self.id_length {
            config.ids.short_length = length;
        }
        if self.allow_duplicates {
            config.ids.allow_duplicates = true;
        }

        if self.dry_run {
            config.run.dry_run = true;
        }
        if self.no_insert {
            config.run.insert = false;
        }

        if !self.include_elements.is_empty() {
            config.elements.include = self.include_elements.clone();
        }
        if !self.exclude_elements.is_empty() {
            config.elements.exclude = self.exclude_elements.clone();
        }
        if !self.expected_attributes.is_empty() {
            config.elements.expected_attributes = self.expected_attributes.clone();
        }
        if self.refresh_empty {
            config.elements.always_refresh_empty = true;
        }

        if let Some(level) = &self.log_level {
            config.logging.level = level.to_lowercase();
        }
    }
}
