use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Passed,
    Failed,
    Broken,
    Skipped,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Broken => "broken",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Scheduled,
    Running,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Blocker,
    Critical,
    Normal,
    Minor,
    Trivial,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blocker => "blocker",
            Self::Critical => "critical",
            Self::Normal => "normal",
            Self::Minor => "minor",
            Self::Trivial => "trivial",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct StatusDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl StatusDetails {
    #[must_use]
    pub fn with_message(message: Option<String>) -> Self {
        Self {
            message,
            trace: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl Label {
    pub const TEST_CLASS: &'static str = "testClass";
    pub const TEST_METHOD: &'static str = "testMethod";
    pub const HOST: &'static str = "host";
    pub const THREAD: &'static str = "thread";
    pub const STORY: &'static str = "story";
    pub const FEATURE: &'static str = "feature";
    pub const EPIC: &'static str = "epic";
    pub const SEVERITY: &'static str = "severity";

    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterMode {
    Default,
    Masked,
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Parameter {
    pub name: String,
    pub value: String,
    /// Excluded parameters are reported but ignored when computing test case
    /// and history ids.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub excluded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<ParameterMode>,
}

impl Parameter {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            excluded: false,
            mode: None,
        }
    }

    #[must_use]
    pub fn excluded(mut self) -> Self {
        self.excluded = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Link {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub url: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_case_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerun_of: Option<String>,
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_details: Option<StatusDetails>,
    pub stage: Stage,
    pub labels: Vec<Label>,
    pub parameters: Vec<Parameter>,
    pub links: Vec<Link>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<i64>,
}

impl TestResult {
    #[must_use]
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            history_id: None,
            test_case_id: None,
            rerun_of: None,
            name: None,
            full_name: None,
            description: None,
            description_html: None,
            status: None,
            status_details: None,
            stage: Stage::Scheduled,
            labels: Vec::new(),
            parameters: Vec::new(),
            links: Vec::new(),
            start: None,
            stop: None,
        }
    }

    pub fn labels_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.labels
            .iter()
            .filter(move |label| label.name == name)
            .map(|label| label.value.as_str())
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TestResultContainer {
    pub uuid: String,
    pub children: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<i64>,
}

impl TestResultContainer {
    #[must_use]
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            children: Vec::new(),
            start: None,
            stop: None,
        }
    }
}

/// Where a [`Directive`] was declared. Native attributes take precedence over
/// legacy doc-block annotations for single-valued fields.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveSource {
    Legacy,
    #[default]
    Native,
}

/// A single piece of decoded test metadata.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Directive {
    /// A legacy title or a native display name.
    Title {
        value: String,
        #[serde(default)]
        source: DirectiveSource,
    },
    Description {
        value: String,
        #[serde(default)]
        html: bool,
        #[serde(default)]
        source: DirectiveSource,
    },
    Severity {
        level: Severity,
        #[serde(default)]
        source: DirectiveSource,
    },
    Parameter {
        name: String,
        value: String,
        #[serde(default)]
        excluded: bool,
        #[serde(default)]
        mode: Option<ParameterMode>,
        #[serde(default)]
        source: DirectiveSource,
    },
    Label {
        name: String,
        value: String,
        #[serde(default)]
        source: DirectiveSource,
    },
    Story {
        value: String,
        #[serde(default)]
        source: DirectiveSource,
    },
    Feature {
        value: String,
        #[serde(default)]
        source: DirectiveSource,
    },
    Epic {
        value: String,
        #[serde(default)]
        source: DirectiveSource,
    },
    Link {
        name: String,
        #[serde(default)]
        url: Option<String>,
        #[serde(default, rename = "type")]
        link_type: Option<String>,
        #[serde(default)]
        source: DirectiveSource,
    },
}

impl Directive {
    #[must_use]
    pub const fn source(&self) -> DirectiveSource {
        match self {
            Self::Title { source, .. }
            | Self::Description { source, .. }
            | Self::Severity { source, .. }
            | Self::Parameter { source, .. }
            | Self::Label { source, .. }
            | Self::Story { source, .. }
            | Self::Feature { source, .. }
            | Self::Epic { source, .. }
            | Self::Link { source, .. } => *source,
        }
    }
}

/// An error thrown by a test body, as observed by the test's own failure hook.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CapturedError {
    /// The error's type name, e.g. `AssertionFailedError`.
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub trace: Option<String>,
}
