//! Result tracking and identity correlation for unit-test report adapters.
//!
//! A runner reports each test through a sequence of callbacks keyed by a
//! free-text label. [`TestLifecycle`] resolves that label into a
//! [`TestIdentity`], keeps one in-flight [`attest_types::TestResult`] per
//! test, merges declared metadata into it, links reruns through the
//! [`RunRegistry`] and finally hands the record to a [`ResultWriter`].
//! [`Extension`] maps runner events onto those lifecycle calls.

pub mod context;
pub mod detector;
pub mod errors;
pub mod extension;
pub mod identity;
pub mod lifecycle;
pub mod mailbox;
pub mod merger;
pub mod metadata;
pub mod registry;
pub mod sink;

pub use context::TestIdentity;
pub use detector::{DefaultStatusDetector, EnvThreadDetector, StatusDetector, ThreadDetector};
pub use errors::{LifecycleError, MergeError, MetadataError};
pub use extension::{Extension, RunnerEvent};
pub use lifecycle::{LifecycleBuilder, Phase, TestLifecycle};
pub use mailbox::ExceptionMailbox;
pub use metadata::{MetadataSource, StaticMetadata};
pub use registry::{RunInfo, RunRegistry};
pub use sink::{LifecycleHook, ResultWriter};
