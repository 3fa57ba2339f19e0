use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "attest.toml";
pub const DEFAULT_OUTPUT_DIRECTORY: &str = "build/allure-results";
pub const DEFAULT_THREAD_VARIABLE: &str = "UNIQUE_TEST_TOKEN";

/// Placeholder replaced by the link name when a link template is expanded.
pub const LINK_PLACEHOLDER: &str = "%s";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },
    #[error("link template for \"{link_type}\" has no %s placeholder: {template}")]
    InvalidLinkTemplate { link_type: String, template: String },
    #[error("config key \"thread_variable\" should contain a non-empty string")]
    EmptyThreadVariable,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(transparent)]
pub struct LinkTemplates(BTreeMap<String, String>);

impl LinkTemplates {
    pub fn insert(&mut self, link_type: impl Into<String>, template: impl Into<String>) {
        self.0.insert(link_type.into(), template.into());
    }

    /// Expands the template registered for `link_type`, if any.
    #[must_use]
    pub fn resolve(&self, link_type: &str, name: &str) -> Option<String> {
        self.0
            .get(link_type)
            .map(|template| template.replace(LINK_PLACEHOLDER, name))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (link_type, template) in &self.0 {
            if !template.contains(LINK_PLACEHOLDER) {
                return Err(ConfigError::InvalidLinkTemplate {
                    link_type: link_type.clone(),
                    template: template.clone(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub output_directory: PathBuf,
    pub containers: bool,
    pub thread_variable: String,
    pub host: Option<String>,
    pub failure_kinds: Vec<String>,
    pub link_templates: LinkTemplates,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from(DEFAULT_OUTPUT_DIRECTORY),
            containers: true,
            thread_variable: DEFAULT_THREAD_VARIABLE.into(),
            host: None,
            failure_kinds: vec![
                "AssertionFailedError".into(),
                "ExpectationFailedException".into(),
            ],
            link_templates: LinkTemplates::default(),
        }
    }
}

impl Config {
    /// Reads and validates the config file at `path`.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read, is not valid TOML, contains
    /// unknown keys, or does not pass validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, path)
    }

    /// Loads `attest.toml` from `dir`, or the defaults when there is none.
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`] for a file that exists.
    pub fn discover(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.is_file() {
            debug!("loading config from {}", path.display());
            Self::load(&path)
        } else {
            debug!("no {CONFIG_FILE_NAME} in {}, using defaults", dir.display());
            Ok(Self::default())
        }
    }

    /// Parses config `contents`; `origin` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Fails on malformed TOML or invalid values.
    pub fn parse(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source: Box::new(source),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns the first invalid value found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thread_variable.is_empty() {
            return Err(ConfigError::EmptyThreadVariable);
        }
        self.link_templates.validate()
    }
}
