use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::lifecycle::Phase;

/// A fault in the adapter itself. Test failures are never reported through
/// this type; they become result statuses instead.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("current test is not set")]
    CurrentTestNotSet,
    #[error("test not registered: {label}")]
    TestNotRegistered { label: String },
    #[error("container not registered: {label}")]
    ContainerNotRegistered { label: String },
    #[error("cannot {operation} test {uuid} while it is {phase}")]
    InvalidTransition {
        operation: &'static str,
        uuid: String,
        phase: Phase,
    },
    #[error("annotations not loaded for {target}")]
    Metadata {
        target: String,
        #[source]
        source: MetadataError,
    },
    #[error("malformed metadata for {label}")]
    Merge {
        label: String,
        #[source]
        source: MergeError,
    },
    #[error("failed to write {kind} {uuid}")]
    Write {
        kind: &'static str,
        uuid: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("class not found: {class}")]
    ClassNotFound { class: String },
    #[error("method not found: {class}::{method}")]
    MethodNotFound { class: String, method: String },
    #[error("failed to read metadata manifest {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse metadata manifest")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("parameter directive has an empty name")]
    EmptyParameterName,
    #[error("label directive has an empty name")]
    EmptyLabelName,
    #[error("link \"{name}\" has no url and no template for type {link_type:?}")]
    UnresolvedLink {
        name: String,
        link_type: Option<String>,
    },
}
