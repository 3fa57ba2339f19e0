use std::borrow::Cow;
use std::sync::LazyLock;

use log::trace;
use regex::Regex;

use crate::identity::SEPARATOR;
use crate::metadata::MetadataSource;

// `Class::method with data set "label" (args...)`
static LABELED_WITH_ARGUMENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\S+)\s+with\s+data\s+set\s+"(.*)"\s+\(.+\)$"#).expect("valid regex")
});

static CLASS_AND_METHOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+)(.*)$").expect("valid regex"));

// ` with data set #3` or ` with data set "label"`
static DATA_SET_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s+with\s+data\s+set\s+(?:(#\d+)|"(.*)")$"#).expect("valid regex")
});

/// Who is running right now, as far as the runner's label tells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestIdentity {
    label: String,
    class: Option<String>,
    method: Option<String>,
    data_label: Option<String>,
    host: Option<String>,
    thread: Option<String>,
}

impl TestIdentity {
    #[must_use]
    pub fn new(
        label: impl Into<String>,
        class: Option<String>,
        method: Option<String>,
        data_label: Option<String>,
        host: Option<String>,
        thread: Option<String>,
    ) -> Self {
        Self {
            label: label.into(),
            class,
            method,
            data_label,
            host,
            thread,
        }
    }

    /// Parses a runner label. A class the metadata source does not know is
    /// dropped so a bogus prefix is never treated as a class.
    #[must_use]
    pub fn resolve(
        label: &str,
        metadata: &dyn MetadataSource,
        host: Option<String>,
        thread: Option<String>,
    ) -> Self {
        let parsed = ParsedLabel::parse(label);
        let (class, method) = match parsed.class_and_method.split_once(SEPARATOR) {
            Some((class, method)) => (class, Some(method)),
            None => (parsed.class_and_method, None),
        };
        let class = metadata.class_exists(class).then(|| class.to_owned());
        trace!(
            "resolved {label:?}: class={class:?} method={method:?} data_label={:?}",
            parsed.data_label
        );

        Self {
            label: label.to_owned(),
            class,
            method: method.map(str::to_owned),
            data_label: parsed.data_label.map(str::to_owned),
            host,
            thread,
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    #[must_use]
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    #[must_use]
    pub fn data_label(&self) -> Option<&str> {
        self.data_label.as_deref()
    }

    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    #[must_use]
    pub fn thread(&self) -> Option<&str> {
        self.thread.as_deref()
    }

    #[must_use]
    pub fn full_name(&self) -> Option<String> {
        match (&self.class, &self.method) {
            (Some(class), Some(method)) => Some(format!("{class}{SEPARATOR}{method}")),
            _ => None,
        }
    }

    /// The full name when known, otherwise the raw label.
    #[must_use]
    pub fn name(&self) -> Cow<'_, str> {
        match self.full_name() {
            Some(full_name) => Cow::Owned(full_name),
            None => Cow::Borrowed(&self.label),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct ParsedLabel<'a> {
    class_and_method: &'a str,
    data_label: Option<&'a str>,
}

impl<'a> ParsedLabel<'a> {
    fn parse(label: &'a str) -> Self {
        if let Some(captures) = LABELED_WITH_ARGUMENTS.captures(label) {
            return Self {
                class_and_method: captures.get(1).map_or(label, |m| m.as_str()),
                data_label: captures
                    .get(2)
                    .map(|m| m.as_str())
                    .filter(|data_label| !data_label.is_empty()),
            };
        }

        let Some(captures) = CLASS_AND_METHOD.captures(label) else {
            return Self {
                class_and_method: label,
                data_label: None,
            };
        };
        let class_and_method = captures.get(1).map_or(label, |m| m.as_str());
        let data_label = captures
            .get(2)
            .and_then(|rest| DATA_SET_SUFFIX.captures(rest.as_str()))
            .and_then(|suffix| suffix.get(2).or_else(|| suffix.get(1)))
            .map(|m| m.as_str())
            .filter(|data_label| !data_label.is_empty());

        Self {
            class_and_method,
            data_label,
        }
    }
}
