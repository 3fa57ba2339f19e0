use std::cell::RefCell;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use attest_lifecycle::ResultWriter;
use attest_types::{TestResult, TestResultContainer};
use log::{debug, trace};
use serde::Serialize;

use crate::RunSummary;

pub const RESULT_SUFFIX: &str = "-result.json";
pub const CONTAINER_SUFFIX: &str = "-container.json";

/// Writes one JSON file per result and per container into a report
/// directory, creating the directory on first write.
///
/// Clones share the run summary, so a clone kept by the caller sees every
/// result written through the lifecycle.
#[derive(Debug, Clone)]
pub struct JsonResultWriter {
    output_directory: PathBuf,
    thread: Option<String>,
    summary: Rc<RefCell<RunSummary>>,
}

impl JsonResultWriter {
    #[must_use]
    pub fn new(output_directory: impl Into<PathBuf>) -> Self {
        Self {
            output_directory: output_directory.into(),
            thread: None,
            summary: Rc::default(),
        }
    }

    #[must_use]
    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    #[must_use]
    pub fn summary(&self) -> RunSummary {
        *self.summary.borrow()
    }

    #[must_use]
    pub fn result_path(&self, uuid: &str) -> PathBuf {
        self.output_directory.join(format!("{uuid}{RESULT_SUFFIX}"))
    }

    #[must_use]
    pub fn container_path(&self, uuid: &str) -> PathBuf {
        self.output_directory.join(format!("{uuid}{CONTAINER_SUFFIX}"))
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> io::Result<()> {
        fs::create_dir_all(&self.output_directory)?;
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        trace!("wrote {}", path.display());
        Ok(())
    }
}

impl ResultWriter for JsonResultWriter {
    fn switch_thread(&mut self, thread: Option<&str>) {
        if self.thread.as_deref() != thread {
            debug!("results now come from thread {thread:?}");
            self.thread = thread.map(str::to_owned);
        }
    }

    fn write_test(&mut self, result: &TestResult) -> io::Result<()> {
        self.write_json(&self.result_path(&result.uuid), result)?;
        self.summary.borrow_mut().record(result.status);
        Ok(())
    }

    fn write_container(&mut self, container: &TestResultContainer) -> io::Result<()> {
        self.write_json(&self.container_path(&container.uuid), container)
    }
}

#[cfg(test)]
mod tests {
    use attest_types::{Label, Stage, Status};

    use super::*;

    fn read_json(path: &Path) -> serde_json::Value {
        let contents = fs::read_to_string(path).expect("file written");
        serde_json::from_str(&contents).expect("valid json")
    }

    fn passed(uuid: &str) -> TestResult {
        let mut result = TestResult::new(uuid);
        result.name = Some("App\\StackTest::testPush".into());
        result.status = Some(Status::Passed);
        result.stage = Stage::Finished;
        result.labels.push(Label::new(Label::HOST, "ci-host"));
        result
    }

    #[test]
    fn writes_result_file_in_report_shape() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut writer = JsonResultWriter::new(dir.path());

        writer.write_test(&passed("u-1")).expect("written");

        let json = read_json(&dir.path().join("u-1-result.json"));
        assert_eq!(json["uuid"], "u-1");
        assert_eq!(json["name"], "App\\StackTest::testPush");
        assert_eq!(json["status"], "passed");
        assert_eq!(json["stage"], "finished");
        assert_eq!(json["labels"][0]["name"], "host");
        assert_eq!(json["labels"][0]["value"], "ci-host");
    }

    #[test]
    fn writes_container_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut writer = JsonResultWriter::new(dir.path());
        let mut container = TestResultContainer::new("c-1");
        container.children.push("u-1".into());
        container.start = Some(1_700_000_000_000);

        writer.write_container(&container).expect("written");

        let json = read_json(&writer.container_path("c-1"));
        assert_eq!(json["children"][0], "u-1");
        assert_eq!(json["start"], 1_700_000_000_000_i64);
        assert!(json.get("stop").is_none());
    }

    #[test]
    fn creates_missing_output_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("build").join("allure-results");
        let mut writer = JsonResultWriter::new(&nested);

        writer.write_test(&passed("u-1")).expect("written");

        assert!(nested.join("u-1-result.json").is_file());
        assert_eq!(writer.output_directory(), nested);
    }

    #[test]
    fn clones_share_the_summary() {
        let dir = tempfile::tempdir().expect("tempdir");
        let observer = JsonResultWriter::new(dir.path());
        let mut writer = observer.clone();

        writer.write_test(&passed("u-1")).expect("written");
        let mut skipped = passed("u-2");
        skipped.status = Some(Status::Skipped);
        writer.write_test(&skipped).expect("written");

        let summary = observer.summary();
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.total(), 2);
    }

    #[test]
    fn unwritable_directory_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("occupied");
        fs::write(&file, "not a directory").expect("write file");
        let mut writer = JsonResultWriter::new(&file);

        assert!(writer.write_test(&passed("u-1")).is_err());
        assert_eq!(writer.summary().total(), 0);
    }
}
