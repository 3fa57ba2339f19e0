use std::collections::HashMap;

use attest_types::Parameter;
use log::debug;

use crate::context::TestIdentity;
use crate::errors::LifecycleError;
use crate::identity;

/// Identity and rerun linkage of one finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInfo {
    pub uuid: String,
    /// The uuid of the previous run sharing this history id, if any.
    pub rerun_of: Option<String>,
    pub run_index: usize,
    pub test_case_id: String,
    pub history_id: String,
}

#[derive(Debug, Clone)]
struct StartInfo {
    test_id: String,
    container_id: Option<String>,
}

/// Per-worker bookkeeping of in-flight tests and previous runs.
///
/// Two independent maps: runner label to the uuid of the result currently
/// being reported, and history id to the latest run with that history. The
/// second one is only meaningful within one worker process.
#[derive(Debug, Default)]
pub struct RunRegistry {
    starts: HashMap<String, StartInfo>,
    runs: HashMap<String, RunInfo>,
}

impl RunRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_test(&mut self, uuid: &str, identity: &TestIdentity) -> String {
        self.insert_start(identity, uuid, None)
    }

    pub fn register_start(
        &mut self,
        container_uuid: &str,
        uuid: &str,
        identity: &TestIdentity,
    ) -> String {
        self.insert_start(identity, uuid, Some(container_uuid))
    }

    fn insert_start(
        &mut self,
        identity: &TestIdentity,
        uuid: &str,
        container_uuid: Option<&str>,
    ) -> String {
        self.starts.insert(
            identity.label().to_owned(),
            StartInfo {
                test_id: uuid.to_owned(),
                container_id: container_uuid.map(str::to_owned),
            },
        );
        uuid.to_owned()
    }

    /// # Errors
    ///
    /// Fails when no test was registered under this identity's label.
    pub fn test_id(&self, identity: &TestIdentity) -> Result<&str, LifecycleError> {
        self.starts
            .get(identity.label())
            .map(|start| start.test_id.as_str())
            .ok_or_else(|| LifecycleError::TestNotRegistered {
                label: identity.label().to_owned(),
            })
    }

    /// # Errors
    ///
    /// Fails when no test was registered under this identity's label, or it
    /// was registered without a container.
    pub fn container_id(&self, identity: &TestIdentity) -> Result<&str, LifecycleError> {
        self.starts
            .get(identity.label())
            .and_then(|start| start.container_id.as_deref())
            .ok_or_else(|| LifecycleError::ContainerNotRegistered {
                label: identity.label().to_owned(),
            })
    }

    /// Computes the ids of a run and links it to the previous run with the
    /// same history id. The entry for that history id is always replaced.
    pub fn register_run(
        &mut self,
        uuid: &str,
        identity: &TestIdentity,
        parameters: &[Parameter],
    ) -> RunInfo {
        let name = identity.name();
        let test_case_id = identity::test_case_id(&name, parameters);
        let history_id = identity::history_id(&name, parameters);

        let previous = self.runs.get(&history_id);
        let info = RunInfo {
            uuid: uuid.to_owned(),
            rerun_of: previous.map(|run| run.uuid.clone()),
            run_index: previous.map_or(0, |run| run.run_index + 1),
            test_case_id,
            history_id,
        };
        if let Some(rerun_of) = &info.rerun_of {
            debug!(
                "{} is run #{} of {name}, rerun of {rerun_of}",
                info.uuid, info.run_index
            );
        }
        self.runs.insert(info.history_id.clone(), info.clone());
        info
    }

    /// Forgets everything, e.g. between isolated suites.
    pub fn reset(&mut self) {
        self.starts.clear();
        self.runs.clear();
    }
}
