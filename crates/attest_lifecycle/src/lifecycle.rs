use std::collections::HashMap;
use std::fmt;

use attest_config::{Config, LinkTemplates};
use attest_types::{Stage, Status, StatusDetails, TestResult, TestResultContainer};
use chrono::Utc;
use log::{debug, warn};
use uuid::Uuid;

use crate::context::TestIdentity;
use crate::detector::{DefaultStatusDetector, EnvThreadDetector, StatusDetector, ThreadDetector};
use crate::errors::LifecycleError;
use crate::mailbox::ExceptionMailbox;
use crate::merger;
use crate::metadata::{self, MetadataSource, StaticMetadata};
use crate::registry::RunRegistry;
use crate::sink::{LifecycleHook, ResultWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    Started,
    Stopped,
    Written,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Written => "written",
        })
    }
}

const NOT_WRITTEN: &[Phase] = &[Phase::Created, Phase::Started, Phase::Stopped];

struct InFlight {
    result: TestResult,
    container: Option<TestResultContainer>,
    phase: Phase,
}

fn now() -> i64 {
    Utc::now().timestamp_millis()
}

// Written results are no longer in flight, so a miss reads as `Written`.
fn in_flight_mut<'a>(
    in_flight: &'a mut HashMap<String, InFlight>,
    uuid: &str,
    operation: &'static str,
    allowed: &[Phase],
) -> Result<&'a mut InFlight, LifecycleError> {
    let phase = in_flight.get(uuid).map_or(Phase::Written, |flight| flight.phase);
    if !allowed.contains(&phase) {
        return Err(LifecycleError::InvalidTransition {
            operation,
            uuid: uuid.to_owned(),
            phase,
        });
    }
    in_flight
        .get_mut(uuid)
        .ok_or_else(|| LifecycleError::InvalidTransition {
            operation,
            uuid: uuid.to_owned(),
            phase,
        })
}

/// Drives one worker's test results from creation to the writer.
///
/// Every operation except [`TestLifecycle::switch_to`] acts on the current
/// test and fails with [`LifecycleError::CurrentTestNotSet`] before the
/// first switch. Operations return `&mut Self` so a runner callback reads as
/// one chain:
///
/// ```ignore
/// lifecycle.switch_to(label)?.reset()?.create()?.update_info()?.start()?;
/// ```
pub struct TestLifecycle {
    writer: Box<dyn ResultWriter>,
    status_detector: Box<dyn StatusDetector>,
    thread_detector: Box<dyn ThreadDetector>,
    metadata: Box<dyn MetadataSource>,
    hooks: Vec<Box<dyn LifecycleHook>>,
    link_templates: LinkTemplates,
    containers: bool,
    registry: RunRegistry,
    mailbox: ExceptionMailbox,
    current: Option<TestIdentity>,
    in_flight: HashMap<String, InFlight>,
}

impl TestLifecycle {
    /// Makes `label` the current test and tells the writer which worker
    /// thread it runs on.
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the other chain steps.
    pub fn switch_to(&mut self, label: &str) -> Result<&mut Self, LifecycleError> {
        let thread = self.thread_detector.thread();
        self.writer.switch_thread(thread.as_deref());

        let identity = TestIdentity::resolve(
            label,
            self.metadata.as_ref(),
            self.thread_detector.host(),
            thread,
        );
        self.mailbox.enter(label);
        debug!("switched to {label}");
        self.current = Some(identity);
        Ok(self)
    }

    /// Forgets any error captured before this test started.
    ///
    /// # Errors
    ///
    /// Fails when no test is current.
    pub fn reset(&mut self) -> Result<&mut Self, LifecycleError> {
        self.current_test()?;
        self.mailbox.clear();
        Ok(self)
    }

    /// Schedules a fresh result for the current test, replacing any earlier
    /// registration under the same label once its result is written.
    ///
    /// # Errors
    ///
    /// Fails when no test is current, or when the label's previous result
    /// is still in flight.
    pub fn create(&mut self) -> Result<&mut Self, LifecycleError> {
        let identity = self.current.as_ref().ok_or(LifecycleError::CurrentTestNotSet)?;
        if let Ok(previous) = self.registry.test_id(identity)
            && let Some(flight) = self.in_flight.get(previous)
        {
            return Err(LifecycleError::InvalidTransition {
                operation: "create",
                uuid: previous.to_owned(),
                phase: flight.phase,
            });
        }
        let uuid = Uuid::new_v4().to_string();

        let mut result = TestResult::new(uuid.as_str());
        for hook in &mut self.hooks {
            hook.before_schedule(&mut result);
        }

        let container = if self.containers {
            let mut container = TestResultContainer::new(Uuid::new_v4().to_string());
            container.start = Some(now());
            container.children.push(uuid.clone());
            self.registry
                .register_start(&container.uuid, &uuid, identity);
            Some(container)
        } else {
            self.registry.register_test(&uuid, identity);
            None
        };

        debug!("created {uuid} for {}", identity.label());
        self.in_flight.insert(
            uuid,
            InFlight {
                result,
                container,
                phase: Phase::Created,
            },
        );
        Ok(self)
    }

    /// Merges system facts and declared metadata into the current result.
    ///
    /// # Errors
    ///
    /// Fails when the metadata cannot be read or is malformed, and on the
    /// sequencing faults every operation shares.
    pub fn update_info(&mut self) -> Result<&mut Self, LifecycleError> {
        let identity = self.current.as_ref().ok_or(LifecycleError::CurrentTestNotSet)?;
        let uuid = self.registry.test_id(identity)?;
        let flight = in_flight_mut(&mut self.in_flight, uuid, "update", NOT_WRITTEN)?;

        let directives = metadata::collect_directives(self.metadata.as_ref(), identity)?;
        merger::set_info(&mut flight.result, identity, &directives, &self.link_templates)
            .map_err(|source| LifecycleError::Merge {
                label: identity.label().to_owned(),
                source,
            })?;
        Ok(self)
    }

    /// # Errors
    ///
    /// Fails unless the current result was created and not yet started.
    pub fn start(&mut self) -> Result<&mut Self, LifecycleError> {
        let identity = self.current.as_ref().ok_or(LifecycleError::CurrentTestNotSet)?;
        let uuid = self.registry.test_id(identity)?;
        let flight = in_flight_mut(&mut self.in_flight, uuid, "start", &[Phase::Created])?;

        flight.phase = Phase::Started;
        flight.result.stage = Stage::Running;
        flight.result.start = Some(now());
        for hook in &mut self.hooks {
            hook.after_start(&flight.result);
        }
        debug!("started {uuid}");
        Ok(self)
    }

    /// Stops the current result and its container. A result that never
    /// started, e.g. a skipped test, may be stopped too.
    ///
    /// # Errors
    ///
    /// Fails when the current result is already stopped or written.
    pub fn stop(&mut self) -> Result<&mut Self, LifecycleError> {
        let identity = self.current.as_ref().ok_or(LifecycleError::CurrentTestNotSet)?;
        let uuid = self.registry.test_id(identity)?;
        let flight = in_flight_mut(
            &mut self.in_flight,
            uuid,
            "stop",
            &[Phase::Created, Phase::Started],
        )?;

        let stop = now();
        flight.phase = Phase::Stopped;
        flight.result.stage = Stage::Finished;
        flight.result.stop = Some(stop);
        if let Some(container) = &mut flight.container {
            container.stop = Some(stop);
        }
        for hook in &mut self.hooks {
            hook.after_stop(&flight.result);
        }
        debug!("stopped {uuid}");
        Ok(self)
    }

    /// Computes the test case and history ids of the current result and
    /// links it to the previous run with the same history.
    ///
    /// # Errors
    ///
    /// Fails when the current result is already written.
    pub fn update_run_info(&mut self) -> Result<&mut Self, LifecycleError> {
        let identity = self.current.as_ref().ok_or(LifecycleError::CurrentTestNotSet)?;
        let uuid = self.registry.test_id(identity)?.to_owned();
        let flight = in_flight_mut(&mut self.in_flight, &uuid, "update", NOT_WRITTEN)?;

        let run = self
            .registry
            .register_run(&uuid, identity, &flight.result.parameters);
        flight.result.test_case_id = Some(run.test_case_id);
        flight.result.history_id = Some(run.history_id);
        flight.result.rerun_of = run.rerun_of;
        Ok(self)
    }

    /// # Errors
    ///
    /// Fails when the current result is already written.
    pub fn update_status(
        &mut self,
        message: Option<&str>,
        status: Option<Status>,
    ) -> Result<&mut Self, LifecycleError> {
        let identity = self.current.as_ref().ok_or(LifecycleError::CurrentTestNotSet)?;
        let uuid = self.registry.test_id(identity)?;
        let flight = in_flight_mut(&mut self.in_flight, uuid, "update", NOT_WRITTEN)?;

        flight.result.status = status;
        flight.result.status_details =
            Some(StatusDetails::with_message(message.map(str::to_owned)));
        Ok(self)
    }

    /// Classifies the error the current test threw, if the mailbox holds
    /// one, and falls back to [`TestLifecycle::update_status`] otherwise.
    /// `override_status` replaces the classified status but keeps the
    /// error's details.
    ///
    /// # Errors
    ///
    /// Fails when the current result is already written.
    pub fn update_detected_status(
        &mut self,
        message: Option<&str>,
        status: Option<Status>,
        override_status: Option<Status>,
    ) -> Result<&mut Self, LifecycleError> {
        let identity = self.current.as_ref().ok_or(LifecycleError::CurrentTestNotSet)?;
        let Some(error) = self.mailbox.peek_for(identity.label()) else {
            return self.update_status(message, status);
        };
        let uuid = self.registry.test_id(identity)?;
        let flight = in_flight_mut(&mut self.in_flight, uuid, "update", NOT_WRITTEN)?;

        let detected = override_status.unwrap_or_else(|| self.status_detector.status(&error));
        debug!("{uuid} threw {}, reporting {detected}", error.kind);
        flight.result.status = Some(detected);
        flight.result.status_details = Some(self.status_detector.status_details(&error));
        Ok(self)
    }

    /// Hands the current result, then its container, to the writer. The
    /// record leaves the in-flight table only once both are persisted.
    ///
    /// # Errors
    ///
    /// Fails unless the current result is stopped, or when the writer fails.
    pub fn write(&mut self) -> Result<&mut Self, LifecycleError> {
        let identity = self.current.as_ref().ok_or(LifecycleError::CurrentTestNotSet)?;
        let uuid = self.registry.test_id(identity)?.to_owned();
        let flight = in_flight_mut(&mut self.in_flight, &uuid, "write", &[Phase::Stopped])?;

        for hook in &mut self.hooks {
            hook.before_write(&mut flight.result);
        }
        if flight.result.status.is_none() {
            warn!("{} is written without a status", identity.label());
        }
        self.writer
            .write_test(&flight.result)
            .map_err(|source| LifecycleError::Write {
                kind: "test",
                uuid: uuid.clone(),
                source,
            })?;
        if let Some(container) = &flight.container {
            self.writer
                .write_container(container)
                .map_err(|source| LifecycleError::Write {
                    kind: "container",
                    uuid: container.uuid.clone(),
                    source,
                })?;
        }
        self.in_flight.remove(&uuid);
        debug!("wrote {uuid}");
        Ok(self)
    }

    fn current_test(&self) -> Result<&TestIdentity, LifecycleError> {
        self.current.as_ref().ok_or(LifecycleError::CurrentTestNotSet)
    }

    #[must_use]
    pub fn current(&self) -> Option<&TestIdentity> {
        self.current.as_ref()
    }

    /// The uuid of the current test's latest result.
    ///
    /// # Errors
    ///
    /// Fails when no test is current or nothing was created for it.
    pub fn test_id(&self) -> Result<&str, LifecycleError> {
        self.registry.test_id(self.current_test()?)
    }

    /// # Errors
    ///
    /// Fails when no test is current or it was created without a container.
    pub fn container_id(&self) -> Result<&str, LifecycleError> {
        self.registry.container_id(self.current_test()?)
    }

    /// Whether the current test has a result that is not written yet.
    ///
    /// # Errors
    ///
    /// Fails when no test is current.
    pub fn has_in_flight_result(&self) -> Result<bool, LifecycleError> {
        let identity = self.current_test()?;
        Ok(self
            .registry
            .test_id(identity)
            .is_ok_and(|uuid| self.in_flight.contains_key(uuid)))
    }

    /// Phase of an in-flight result. Written results are no longer tracked.
    #[must_use]
    pub fn phase(&self, uuid: &str) -> Option<Phase> {
        self.in_flight.get(uuid).map(|flight| flight.phase)
    }

    /// An in-flight result. Written results are owned by the writer.
    #[must_use]
    pub fn result(&self, uuid: &str) -> Option<&TestResult> {
        self.in_flight.get(uuid).map(|flight| &flight.result)
    }

    #[must_use]
    pub fn mailbox(&self) -> &ExceptionMailbox {
        &self.mailbox
    }

    #[must_use]
    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    /// Drops all registrations, e.g. between isolated suites.
    pub fn reset_registry(&mut self) {
        self.registry.reset();
        self.in_flight.clear();
        self.current = None;
    }
}

type SetupHook = Box<dyn FnOnce(&Config)>;

/// Assembles a [`TestLifecycle`] from a config and its collaborators.
///
/// Collaborators left unset default to the environment thread detector,
/// the default status detector and an empty metadata manifest.
pub struct LifecycleBuilder {
    config: Config,
    writer: Box<dyn ResultWriter>,
    status_detector: Option<Box<dyn StatusDetector>>,
    thread_detector: Option<Box<dyn ThreadDetector>>,
    metadata: Option<Box<dyn MetadataSource>>,
    hooks: Vec<Box<dyn LifecycleHook>>,
    mailbox: Option<ExceptionMailbox>,
    setup: Vec<SetupHook>,
}

impl LifecycleBuilder {
    #[must_use]
    pub fn new(config: Config, writer: impl ResultWriter + 'static) -> Self {
        Self {
            config,
            writer: Box::new(writer),
            status_detector: None,
            thread_detector: None,
            metadata: None,
            hooks: Vec::new(),
            mailbox: None,
            setup: Vec::new(),
        }
    }

    #[must_use]
    pub fn status_detector(mut self, detector: impl StatusDetector + 'static) -> Self {
        self.status_detector = Some(Box::new(detector));
        self
    }

    #[must_use]
    pub fn thread_detector(mut self, detector: impl ThreadDetector + 'static) -> Self {
        self.thread_detector = Some(Box::new(detector));
        self
    }

    #[must_use]
    pub fn metadata(mut self, metadata: impl MetadataSource + 'static) -> Self {
        self.metadata = Some(Box::new(metadata));
        self
    }

    /// Hooks run in the order they are added.
    #[must_use]
    pub fn hook(mut self, hook: impl LifecycleHook + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    /// Shares `mailbox` with whatever captures test errors.
    #[must_use]
    pub fn mailbox(mut self, mailbox: ExceptionMailbox) -> Self {
        self.mailbox = Some(mailbox);
        self
    }

    /// Runs `setup` once with the final config when the lifecycle is built.
    #[must_use]
    pub fn on_setup(mut self, setup: impl FnOnce(&Config) + 'static) -> Self {
        self.setup.push(Box::new(setup));
        self
    }

    #[must_use]
    pub fn build(self) -> TestLifecycle {
        for setup in self.setup {
            setup(&self.config);
        }
        let config = self.config;
        debug!(
            "lifecycle ready: output={} containers={}",
            config.output_directory.display(),
            config.containers
        );

        TestLifecycle {
            writer: self.writer,
            status_detector: self
                .status_detector
                .unwrap_or_else(|| Box::new(DefaultStatusDetector::from_config(&config))),
            thread_detector: self
                .thread_detector
                .unwrap_or_else(|| Box::new(EnvThreadDetector::from_config(&config))),
            metadata: self
                .metadata
                .unwrap_or_else(|| Box::new(StaticMetadata::new())),
            hooks: self.hooks,
            link_templates: config.link_templates,
            containers: config.containers,
            registry: RunRegistry::new(),
            mailbox: self.mailbox.unwrap_or_default(),
            current: None,
            in_flight: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;

    use attest_types::{CapturedError, Directive, DirectiveSource};

    use super::*;
    use crate::errors::MetadataError;

    #[derive(Debug, Default)]
    struct Recorded {
        threads: Vec<Option<String>>,
        tests: Vec<TestResult>,
        containers: Vec<TestResultContainer>,
    }

    #[derive(Debug, Clone, Default)]
    struct Recorder(Rc<RefCell<Recorded>>);

    impl ResultWriter for Recorder {
        fn switch_thread(&mut self, thread: Option<&str>) {
            self.0.borrow_mut().threads.push(thread.map(str::to_owned));
        }

        fn write_test(&mut self, result: &TestResult) -> io::Result<()> {
            self.0.borrow_mut().tests.push(result.clone());
            Ok(())
        }

        fn write_container(&mut self, container: &TestResultContainer) -> io::Result<()> {
            self.0.borrow_mut().containers.push(container.clone());
            Ok(())
        }
    }

    struct Unwritable;

    impl ResultWriter for Unwritable {
        fn write_test(&mut self, _result: &TestResult) -> io::Result<()> {
            Err(io::Error::other("disk full"))
        }

        fn write_container(&mut self, _container: &TestResultContainer) -> io::Result<()> {
            Ok(())
        }
    }

    struct Worker;

    impl ThreadDetector for Worker {
        fn thread(&self) -> Option<String> {
            Some("worker-2".into())
        }

        fn host(&self) -> Option<String> {
            Some("ci-host".into())
        }
    }

    fn metadata() -> StaticMetadata {
        let mut metadata = StaticMetadata::new();
        metadata
            .add_class(
                "C",
                vec![Directive::Feature {
                    value: "Lifecycle".into(),
                    source: DirectiveSource::Native,
                }],
            )
            .add_method("C", "m", Vec::new())
            .add_method("C", "other", Vec::new());
        metadata
    }

    fn lifecycle_with(config: Config) -> (TestLifecycle, Recorder) {
        let recorder = Recorder::default();
        let lifecycle = LifecycleBuilder::new(config, recorder.clone())
            .thread_detector(Worker)
            .metadata(metadata())
            .build();
        (lifecycle, recorder)
    }

    fn lifecycle() -> (TestLifecycle, Recorder) {
        lifecycle_with(Config::default())
    }

    fn assertion(message: &str) -> CapturedError {
        CapturedError {
            kind: "PHPUnit\\Framework\\AssertionFailedError".into(),
            message: message.into(),
            trace: Some("#0 CTest.php(10)".into()),
        }
    }

    fn run_passing(lifecycle: &mut TestLifecycle, label: &str) -> Result<(), LifecycleError> {
        lifecycle
            .switch_to(label)?
            .reset()?
            .create()?
            .update_info()?
            .start()?
            .update_status(None, Some(Status::Passed))?
            .stop()?
            .update_run_info()?
            .write()?;
        Ok(())
    }

    #[test]
    fn passing_test_end_to_end() {
        let (mut lifecycle, recorder) = lifecycle();
        run_passing(&mut lifecycle, "C::m").expect("clean run");

        let recorded = recorder.0.borrow();
        let [result] = recorded.tests.as_slice() else {
            panic!("expected one result, got {}", recorded.tests.len());
        };
        assert_eq!(result.status, Some(Status::Passed));
        assert_eq!(result.stage, Stage::Finished);
        assert!(result.test_case_id.as_deref().is_some_and(|id| !id.is_empty()));
        assert!(result.history_id.as_deref().is_some_and(|id| !id.is_empty()));
        assert_eq!(result.rerun_of, None);
        assert_eq!(result.name.as_deref(), Some("C::m"));
        assert_eq!(result.labels_named("feature").collect::<Vec<_>>(), ["Lifecycle"]);
        assert_eq!(result.labels_named("thread").collect::<Vec<_>>(), ["worker-2"]);
        assert!(result.start.is_some() && result.stop >= result.start);

        let [container] = recorded.containers.as_slice() else {
            panic!("expected one container");
        };
        assert_eq!(container.children, [result.uuid.clone()]);
        assert_eq!(recorded.threads, [Some("worker-2".to_owned())]);
        drop(recorded);

        assert_eq!(lifecycle.has_in_flight_result().ok(), Some(false));
        let uuid = lifecycle.test_id().expect("registered").to_owned();
        assert_eq!(lifecycle.phase(&uuid), None);
        assert!(lifecycle.result(&uuid).is_none());
    }

    #[test]
    fn second_run_is_linked_to_the_first() {
        let (mut lifecycle, recorder) = lifecycle();
        run_passing(&mut lifecycle, "C::m").expect("first run");
        run_passing(&mut lifecycle, "C::m").expect("second run");

        let recorded = recorder.0.borrow();
        assert_eq!(recorded.tests.len(), 2);
        assert_eq!(
            recorded.tests[1].rerun_of.as_deref(),
            Some(recorded.tests[0].uuid.as_str())
        );
        assert_eq!(recorded.tests[0].history_id, recorded.tests[1].history_id);
        assert_ne!(recorded.tests[0].uuid, recorded.tests[1].uuid);
    }

    #[test]
    fn operations_need_a_current_test() {
        let (mut lifecycle, _) = lifecycle();
        assert!(matches!(
            lifecycle.start(),
            Err(LifecycleError::CurrentTestNotSet)
        ));
        assert!(matches!(
            lifecycle.reset(),
            Err(LifecycleError::CurrentTestNotSet)
        ));
        assert!(matches!(
            lifecycle.has_in_flight_result(),
            Err(LifecycleError::CurrentTestNotSet)
        ));
    }

    #[test]
    fn start_before_create_is_not_registered() {
        let (mut lifecycle, _) = lifecycle();
        let err = lifecycle
            .switch_to("C::m")
            .and_then(TestLifecycle::start)
            .err()
            .expect("not registered");
        assert_eq!(err.to_string(), "test not registered: C::m");
    }

    #[test]
    fn out_of_order_transitions_are_rejected() {
        let (mut lifecycle, _) = lifecycle();
        lifecycle
            .switch_to("C::m")
            .and_then(TestLifecycle::create)
            .and_then(TestLifecycle::start)
            .expect("started");

        let err = lifecycle.start().err().expect("already started");
        assert!(matches!(
            err,
            LifecycleError::InvalidTransition {
                operation: "start",
                phase: Phase::Started,
                ..
            }
        ));
        let err = lifecycle.write().err().expect("not stopped");
        assert!(matches!(
            err,
            LifecycleError::InvalidTransition {
                phase: Phase::Started,
                ..
            }
        ));

        lifecycle
            .stop()
            .and_then(TestLifecycle::write)
            .expect("written");
        let err = lifecycle
            .update_status(Some("late"), Some(Status::Failed))
            .err()
            .expect("already written");
        assert!(matches!(
            err,
            LifecycleError::InvalidTransition {
                phase: Phase::Written,
                ..
            }
        ));
    }

    #[test]
    fn skipped_test_stops_without_starting() {
        let (mut lifecycle, recorder) = lifecycle();
        lifecycle
            .switch_to("C::m")
            .and_then(TestLifecycle::create)
            .and_then(TestLifecycle::update_info)
            .and_then(|lifecycle| lifecycle.update_status(Some("no db"), Some(Status::Skipped)))
            .and_then(TestLifecycle::stop)
            .and_then(TestLifecycle::update_run_info)
            .and_then(TestLifecycle::write)
            .expect("skip is reported");

        let recorded = recorder.0.borrow();
        assert_eq!(recorded.tests[0].status, Some(Status::Skipped));
        assert_eq!(recorded.tests[0].start, None);
        assert_eq!(
            recorded.tests[0]
                .status_details
                .as_ref()
                .and_then(|details| details.message.as_deref()),
            Some("no db")
        );
    }

    #[test]
    fn detected_status_uses_the_stored_error() {
        let (mut lifecycle, _) = lifecycle();
        lifecycle
            .switch_to("C::m")
            .and_then(TestLifecycle::reset)
            .and_then(TestLifecycle::create)
            .expect("created");
        lifecycle.mailbox().store(assertion("expected 1, got 2"));

        lifecycle
            .update_detected_status(Some("failed"), Some(Status::Broken), None)
            .expect("updated");
        let uuid = lifecycle.test_id().expect("registered").to_owned();
        let result = lifecycle.result(&uuid).expect("in flight");
        assert_eq!(result.status, Some(Status::Failed));
        let details = result.status_details.as_ref().expect("details");
        assert_eq!(details.message.as_deref(), Some("expected 1, got 2"));
        assert_eq!(details.trace.as_deref(), Some("#0 CTest.php(10)"));
    }

    #[test]
    fn override_status_keeps_error_details() {
        let (mut lifecycle, _) = lifecycle();
        lifecycle
            .switch_to("C::m")
            .and_then(TestLifecycle::create)
            .expect("created");
        lifecycle.mailbox().store(CapturedError {
            kind: "RuntimeException".into(),
            message: "socket closed".into(),
            trace: None,
        });

        lifecycle
            .update_detected_status(Some("x"), Some(Status::Failed), Some(Status::Failed))
            .expect("updated");
        let uuid = lifecycle.test_id().expect("registered").to_owned();
        let result = lifecycle.result(&uuid).expect("in flight");
        assert_eq!(result.status, Some(Status::Failed));
        assert_eq!(
            result
                .status_details
                .as_ref()
                .and_then(|details| details.message.as_deref()),
            Some("socket closed")
        );
    }

    #[test]
    fn stored_error_does_not_leak_into_the_next_test() {
        let (mut lifecycle, _) = lifecycle();
        lifecycle
            .switch_to("C::m")
            .and_then(TestLifecycle::create)
            .expect("created");
        lifecycle.mailbox().store(assertion("from m"));

        lifecycle
            .switch_to("C::other")
            .and_then(TestLifecycle::create)
            .and_then(|lifecycle| {
                lifecycle.update_detected_status(Some("plain"), Some(Status::Broken), None)
            })
            .expect("updated");

        let uuid = lifecycle.test_id().expect("registered").to_owned();
        let result = lifecycle.result(&uuid).expect("in flight");
        assert_eq!(result.status, Some(Status::Broken));
        assert_eq!(
            result
                .status_details
                .as_ref()
                .and_then(|details| details.message.as_deref()),
            Some("plain")
        );
    }

    #[test]
    fn reset_clears_the_mailbox() {
        let (mut lifecycle, _) = lifecycle();
        lifecycle.switch_to("C::m").expect("switched");
        lifecycle.mailbox().store(assertion("stale"));
        lifecycle.reset().expect("reset");
        assert_eq!(lifecycle.mailbox().last(), None);
    }

    #[test]
    fn containers_can_be_disabled() {
        let (mut lifecycle, recorder) = lifecycle_with(Config {
            containers: false,
            ..Config::default()
        });
        run_passing(&mut lifecycle, "C::m").expect("clean run");

        assert!(recorder.0.borrow().containers.is_empty());
        assert!(matches!(
            lifecycle.container_id(),
            Err(LifecycleError::ContainerNotRegistered { .. })
        ));
    }

    #[test]
    fn unknown_method_fails_update_info() {
        let (mut lifecycle, _) = lifecycle();
        let err = lifecycle
            .switch_to("C::missing")
            .and_then(TestLifecycle::create)
            .and_then(TestLifecycle::update_info)
            .err()
            .expect("method is not declared");
        match err {
            LifecycleError::Metadata { target, source } => {
                assert_eq!(target, "C::missing");
                assert!(matches!(source, MetadataError::MethodNotFound { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn writer_failure_is_reported() {
        let mut lifecycle = LifecycleBuilder::new(Config::default(), Unwritable)
            .thread_detector(Worker)
            .build();
        let err = run_passing(&mut lifecycle, "free text").expect_err("write fails");
        assert!(matches!(err, LifecycleError::Write { kind: "test", .. }));

        let uuid = lifecycle.test_id().expect("registered").to_owned();
        assert_eq!(lifecycle.phase(&uuid), Some(Phase::Stopped));
        assert_eq!(
            lifecycle.result(&uuid).and_then(|result| result.status),
            Some(Status::Passed)
        );
        assert_eq!(lifecycle.has_in_flight_result().ok(), Some(true));
    }

    #[test]
    fn create_refuses_to_replace_an_unwritten_result() {
        let (mut lifecycle, recorder) = lifecycle();
        lifecycle
            .switch_to("C::m")
            .and_then(TestLifecycle::create)
            .and_then(TestLifecycle::start)
            .expect("started");
        let first = lifecycle.test_id().expect("registered").to_owned();

        let err = lifecycle.create().err().expect("still in flight");
        match err {
            LifecycleError::InvalidTransition {
                operation,
                uuid,
                phase,
            } => {
                assert_eq!(operation, "create");
                assert_eq!(uuid, first);
                assert_eq!(phase, Phase::Started);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(lifecycle.test_id().ok(), Some(first.as_str()));

        lifecycle
            .stop()
            .and_then(TestLifecycle::write)
            .and_then(TestLifecycle::create)
            .expect("a written result may be replaced");
        assert_ne!(lifecycle.test_id().ok(), Some(first.as_str()));
        assert_eq!(recorder.0.borrow().tests.len(), 1);
    }

    #[test]
    fn hooks_and_setup_are_invoked() {
        struct Tagger(Rc<RefCell<Vec<&'static str>>>);

        impl LifecycleHook for Tagger {
            fn before_schedule(&mut self, _result: &mut TestResult) {
                self.0.borrow_mut().push("schedule");
            }

            fn after_start(&mut self, _result: &TestResult) {
                self.0.borrow_mut().push("start");
            }

            fn after_stop(&mut self, _result: &TestResult) {
                self.0.borrow_mut().push("stop");
            }

            fn before_write(&mut self, result: &mut TestResult) {
                self.0.borrow_mut().push("write");
                result.description = Some("tagged".into());
            }
        }

        let calls = Rc::new(RefCell::new(Vec::new()));
        let seen_output = Rc::new(RefCell::new(None));
        let recorder = Recorder::default();
        let mut lifecycle = LifecycleBuilder::new(Config::default(), recorder.clone())
            .thread_detector(Worker)
            .hook(Tagger(Rc::clone(&calls)))
            .on_setup({
                let seen_output = Rc::clone(&seen_output);
                move |config| *seen_output.borrow_mut() = Some(config.output_directory.clone())
            })
            .build();

        assert_eq!(
            seen_output.borrow().as_deref(),
            Some(std::path::Path::new("build/allure-results"))
        );
        run_passing(&mut lifecycle, "free text").expect("clean run");
        assert_eq!(*calls.borrow(), ["schedule", "start", "stop", "write"]);
        assert_eq!(
            recorder.0.borrow().tests[0].description.as_deref(),
            Some("tagged")
        );
    }

    #[test]
    fn reset_registry_forgets_reruns() {
        let (mut lifecycle, recorder) = lifecycle();
        run_passing(&mut lifecycle, "C::m").expect("first run");
        lifecycle.reset_registry();
        assert!(lifecycle.current().is_none());
        run_passing(&mut lifecycle, "C::m").expect("second run");

        assert_eq!(recorder.0.borrow().tests[1].rerun_of, None);
    }
}
