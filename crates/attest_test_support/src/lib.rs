use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use attest_config::Config;
use attest_lifecycle::{LifecycleBuilder, ResultWriter, StaticMetadata, ThreadDetector};
use attest_types::{
    CapturedError, Directive, DirectiveSource, Severity, TestResult, TestResultContainer,
};

pub const STACK_TEST: &str = "App\\StackTest";

#[derive(Debug, Default)]
pub struct Recorded {
    pub threads: Vec<Option<String>>,
    pub tests: Vec<TestResult>,
    pub containers: Vec<TestResultContainer>,
}

/// Keeps everything written in memory. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingWriter {
    recorded: Rc<RefCell<Recorded>>,
}

impl RecordingWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn tests(&self) -> Vec<TestResult> {
        self.recorded.borrow().tests.clone()
    }

    #[must_use]
    pub fn containers(&self) -> Vec<TestResultContainer> {
        self.recorded.borrow().containers.clone()
    }

    #[must_use]
    pub fn threads(&self) -> Vec<Option<String>> {
        self.recorded.borrow().threads.clone()
    }

    /// The only written result.
    ///
    /// # Panics
    ///
    /// Panics unless exactly one result was written.
    #[must_use]
    pub fn single(&self) -> TestResult {
        match self.recorded.borrow().tests.as_slice() {
            [result] => result.clone(),
            tests => panic!("expected exactly one written result, got {}", tests.len()),
        }
    }
}

impl ResultWriter for RecordingWriter {
    fn switch_thread(&mut self, thread: Option<&str>) {
        self.recorded
            .borrow_mut()
            .threads
            .push(thread.map(str::to_owned));
    }

    fn write_test(&mut self, result: &TestResult) -> io::Result<()> {
        self.recorded.borrow_mut().tests.push(result.clone());
        Ok(())
    }

    fn write_container(&mut self, container: &TestResultContainer) -> io::Result<()> {
        self.recorded.borrow_mut().containers.push(container.clone());
        Ok(())
    }
}

/// Rejects every write.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingWriter;

impl ResultWriter for FailingWriter {
    fn write_test(&mut self, _result: &TestResult) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
    }

    fn write_container(&mut self, _container: &TestResultContainer) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct FixedThreadDetector {
    pub thread: Option<String>,
    pub host: Option<String>,
}

impl FixedThreadDetector {
    #[must_use]
    pub fn new(thread: Option<&str>, host: Option<&str>) -> Self {
        Self {
            thread: thread.map(str::to_owned),
            host: host.map(str::to_owned),
        }
    }
}

impl ThreadDetector for FixedThreadDetector {
    fn thread(&self) -> Option<String> {
        self.thread.clone()
    }

    fn host(&self) -> Option<String> {
        self.host.clone()
    }
}

/// A stack test class with a legacy and a native annotation on each level.
#[must_use]
pub fn stack_metadata() -> StaticMetadata {
    let mut metadata = StaticMetadata::new();
    metadata
        .add_class(
            STACK_TEST,
            vec![
                Directive::Feature {
                    value: "Stack".into(),
                    source: DirectiveSource::Native,
                },
                Directive::Severity {
                    level: Severity::Minor,
                    source: DirectiveSource::Legacy,
                },
            ],
        )
        .add_method(
            STACK_TEST,
            "testPush",
            vec![
                Directive::Title {
                    value: "legacy push title".into(),
                    source: DirectiveSource::Legacy,
                },
                Directive::Title {
                    value: "Push adds an item".into(),
                    source: DirectiveSource::Native,
                },
                Directive::Link {
                    name: "STACK-1".into(),
                    url: None,
                    link_type: Some("issue".into()),
                    source: DirectiveSource::Native,
                },
            ],
        )
        .add_method(STACK_TEST, "testPop", Vec::new())
        .add_method(
            STACK_TEST,
            "testPeek",
            vec![Directive::Parameter {
                name: "retry".into(),
                value: "0".into(),
                excluded: true,
                mode: None,
                source: DirectiveSource::Native,
            }],
        );
    metadata
}

#[must_use]
pub fn config() -> Config {
    let mut config = Config {
        host: Some("test-host".into()),
        ..Config::default()
    };
    config
        .link_templates
        .insert("issue", "https://issues.example.com/%s");
    config
}

/// A builder wired to `writer`, a fixed worker `thread-1` and the stack
/// fixture.
#[must_use]
pub fn builder(writer: &RecordingWriter) -> LifecycleBuilder {
    LifecycleBuilder::new(config(), writer.clone())
        .thread_detector(FixedThreadDetector::new(Some("thread-1"), Some("test-host")))
        .metadata(stack_metadata())
}

#[must_use]
pub fn assertion_error(message: &str) -> CapturedError {
    CapturedError {
        kind: "PHPUnit\\Framework\\AssertionFailedError".into(),
        message: message.into(),
        trace: Some("#0 tests/StackTest.php(21)".into()),
    }
}

#[must_use]
pub fn runtime_error(message: &str) -> CapturedError {
    CapturedError {
        kind: "RuntimeException".into(),
        message: message.into(),
        trace: None,
    }
}
