use std::io;

use attest_types::{TestResult, TestResultContainer};

/// Persists finished results. Implementations decide the format and place.
pub trait ResultWriter {
    /// Called whenever the current worker thread is (re)detected.
    fn switch_thread(&mut self, _thread: Option<&str>) {}

    /// # Errors
    ///
    /// Fails when the result cannot be persisted.
    fn write_test(&mut self, result: &TestResult) -> io::Result<()>;

    /// # Errors
    ///
    /// Fails when the container cannot be persisted.
    fn write_container(&mut self, container: &TestResultContainer) -> io::Result<()>;
}

/// Observes a result at the points where integrations usually amend it.
pub trait LifecycleHook {
    fn before_schedule(&mut self, _result: &mut TestResult) {}
    fn after_start(&mut self, _result: &TestResult) {}
    fn after_stop(&mut self, _result: &TestResult) {}
    fn before_write(&mut self, _result: &mut TestResult) {}
}
