use attest_types::{CapturedError, Status};
use log::debug;

use crate::errors::LifecycleError;
use crate::lifecycle::TestLifecycle;

/// A callback from the test runner, as one JSON object per line:
///
/// ```json
/// {"event": "after_failure", "test": "App\\StackTest::testPop", "message": "empty"}
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunnerEvent {
    BeforeTest {
        test: String,
    },
    AfterTest {
        test: String,
        #[serde(default)]
        time: f64,
    },
    AfterSuccess {
        test: String,
    },
    AfterFailure {
        test: String,
        #[serde(default)]
        message: Option<String>,
    },
    AfterError {
        test: String,
        #[serde(default)]
        message: Option<String>,
    },
    AfterIncomplete {
        test: String,
        #[serde(default)]
        message: Option<String>,
    },
    AfterSkipped {
        test: String,
        #[serde(default)]
        message: Option<String>,
    },
    AfterWarning {
        test: String,
        #[serde(default)]
        message: Option<String>,
    },
    AfterRisky {
        test: String,
        #[serde(default)]
        message: Option<String>,
    },
    /// Raised by the test's own error hook before the runner reports the
    /// failure.
    ExceptionThrown {
        error: CapturedError,
    },
}

/// Translates runner callbacks into lifecycle chains.
pub struct Extension {
    lifecycle: TestLifecycle,
}

impl Extension {
    #[must_use]
    pub fn new(lifecycle: TestLifecycle) -> Self {
        Self { lifecycle }
    }

    #[must_use]
    pub fn lifecycle(&self) -> &TestLifecycle {
        &self.lifecycle
    }

    #[must_use]
    pub fn into_lifecycle(self) -> TestLifecycle {
        self.lifecycle
    }

    /// # Errors
    ///
    /// Propagates any lifecycle fault; test outcomes never fail here.
    pub fn handle(&mut self, event: &RunnerEvent) -> Result<(), LifecycleError> {
        match event {
            RunnerEvent::BeforeTest { test } => self.before_test(test),
            RunnerEvent::AfterTest { test, time } => self.after_test(test, *time),
            RunnerEvent::AfterSuccess { test } => self.after_success(test),
            RunnerEvent::AfterFailure { test, message } => {
                self.after_failure(test, message.as_deref())
            }
            RunnerEvent::AfterError { test, message } => self.after_error(test, message.as_deref()),
            RunnerEvent::AfterIncomplete { test, message } => {
                self.update_status(test, message.as_deref(), Status::Broken)
            }
            RunnerEvent::AfterSkipped { test, message } => {
                self.update_status(test, message.as_deref(), Status::Skipped)
            }
            RunnerEvent::AfterWarning { test, message } => {
                self.update_status(test, message.as_deref(), Status::Broken)
            }
            RunnerEvent::AfterRisky { test, message } => {
                self.update_status(test, message.as_deref(), Status::Failed)
            }
            RunnerEvent::ExceptionThrown { error } => {
                self.exception_thrown(error.clone());
                Ok(())
            }
        }
    }

    /// # Errors
    ///
    /// Propagates any lifecycle fault.
    pub fn before_test(&mut self, test: &str) -> Result<(), LifecycleError> {
        self.lifecycle
            .switch_to(test)?
            .reset()?
            .create()?
            .update_info()?
            .start()?;
        Ok(())
    }

    /// # Errors
    ///
    /// Propagates any lifecycle fault.
    pub fn after_test(&mut self, test: &str, time: f64) -> Result<(), LifecycleError> {
        debug!("{test} finished in {time:.3}s");
        self.ensure_in_flight(test)?
            .stop()?
            .update_run_info()?
            .write()?;
        Ok(())
    }

    /// # Errors
    ///
    /// Propagates any lifecycle fault.
    pub fn after_success(&mut self, test: &str) -> Result<(), LifecycleError> {
        self.ensure_in_flight(test)?
            .update_status(None, Some(Status::Passed))?;
        Ok(())
    }

    /// An assertion failed; the stored error only contributes its details.
    ///
    /// # Errors
    ///
    /// Propagates any lifecycle fault.
    pub fn after_failure(
        &mut self,
        test: &str,
        message: Option<&str>,
    ) -> Result<(), LifecycleError> {
        self.ensure_in_flight(test)?.update_detected_status(
            message,
            Some(Status::Failed),
            Some(Status::Failed),
        )?;
        Ok(())
    }

    /// Something other than an assertion went wrong; the stored error
    /// decides between failed and broken.
    ///
    /// # Errors
    ///
    /// Propagates any lifecycle fault.
    pub fn after_error(
        &mut self,
        test: &str,
        message: Option<&str>,
    ) -> Result<(), LifecycleError> {
        self.ensure_in_flight(test)?
            .update_detected_status(message, Some(Status::Broken), None)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Propagates any lifecycle fault.
    pub fn update_status(
        &mut self,
        test: &str,
        message: Option<&str>,
        status: Status,
    ) -> Result<(), LifecycleError> {
        self.ensure_in_flight(test)?
            .update_status(message, Some(status))?;
        Ok(())
    }

    pub fn exception_thrown(&self, error: CapturedError) {
        self.lifecycle.mailbox().store(error);
    }

    // Skipped tests may be reported without a preceding `before_test`. A
    // result that was already written is left to fail the next operation.
    fn ensure_in_flight(&mut self, test: &str) -> Result<&mut TestLifecycle, LifecycleError> {
        let lifecycle = self.lifecycle.switch_to(test)?;
        let registered = match lifecycle.test_id() {
            Ok(_) => true,
            Err(LifecycleError::TestNotRegistered { .. }) => false,
            Err(err) => return Err(err),
        };
        if !registered {
            debug!("{test} was never created, creating it now");
            lifecycle.create()?.update_info()?;
        }
        Ok(lifecycle)
    }
}
