use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use attest_types::Directive;
use log::trace;

use crate::context::TestIdentity;
use crate::errors::{LifecycleError, MetadataError};

/// Reads the metadata declared on test classes and methods.
pub trait MetadataSource {
    /// Whether `class` names a test class this source can read.
    fn class_exists(&self, class: &str) -> bool;

    /// # Errors
    ///
    /// Fails when the class cannot be read.
    fn class_directives(&self, class: &str) -> Result<Vec<Directive>, MetadataError>;

    /// # Errors
    ///
    /// Fails when the method cannot be read, including when it does not exist.
    fn method_directives(&self, class: &str, method: &str) -> Result<Vec<Directive>, MetadataError>;
}

/// Class-level directives followed by method-level ones. Identities without
/// a class carry no declared metadata.
pub(crate) fn collect_directives(
    reader: &dyn MetadataSource,
    identity: &TestIdentity,
) -> Result<Vec<Directive>, LifecycleError> {
    let Some(class) = identity.class() else {
        return Ok(Vec::new());
    };
    let mut directives = reader
        .class_directives(class)
        .map_err(|source| LifecycleError::Metadata {
            target: class.to_owned(),
            source,
        })?;

    if let Some(method) = identity.method() {
        let method_directives = reader
            .method_directives(class, method)
            .map_err(|source| LifecycleError::Metadata {
                target: format!("{class}::{method}"),
                source,
            })?;
        directives.extend(method_directives);
    }
    trace!("{} directives for {}", directives.len(), identity.label());
    Ok(directives)
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ClassMetadata {
    #[serde(default)]
    directives: Vec<Directive>,
    #[serde(default)]
    methods: BTreeMap<String, Vec<Directive>>,
}

/// An in-memory metadata manifest.
///
/// ```toml
/// [classes."App\\StackTest"]
/// directives = [{ kind = "feature", value = "Stack" }]
///
/// [classes."App\\StackTest".methods]
/// testPush = [{ kind = "title", value = "Push adds an item" }]
/// ```
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticMetadata {
    #[serde(default)]
    classes: BTreeMap<String, ClassMetadata>,
}

impl StaticMetadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Fails on malformed TOML or unknown directive kinds.
    pub fn from_toml(contents: &str) -> Result<Self, MetadataError> {
        Ok(toml::from_str(contents)?)
    }

    /// # Errors
    ///
    /// Fails when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let contents = fs::read_to_string(path).map_err(|source| MetadataError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    pub fn add_class(&mut self, class: impl Into<String>, directives: Vec<Directive>) -> &mut Self {
        self.classes.entry(class.into()).or_default().directives = directives;
        self
    }

    pub fn add_method(
        &mut self,
        class: impl Into<String>,
        method: impl Into<String>,
        directives: Vec<Directive>,
    ) -> &mut Self {
        self.classes
            .entry(class.into())
            .or_default()
            .methods
            .insert(method.into(), directives);
        self
    }
}

impl MetadataSource for StaticMetadata {
    fn class_exists(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    fn class_directives(&self, class: &str) -> Result<Vec<Directive>, MetadataError> {
        self.classes
            .get(class)
            .map(|metadata| metadata.directives.clone())
            .ok_or_else(|| MetadataError::ClassNotFound {
                class: class.to_owned(),
            })
    }

    fn method_directives(
        &self,
        class: &str,
        method: &str,
    ) -> Result<Vec<Directive>, MetadataError> {
        self.classes
            .get(class)
            .and_then(|metadata| metadata.methods.get(method))
            .cloned()
            .ok_or_else(|| MetadataError::MethodNotFound {
                class: class.to_owned(),
                method: method.to_owned(),
            })
    }
}
