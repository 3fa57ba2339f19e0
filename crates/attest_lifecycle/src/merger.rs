//! Folds system facts and declared directives into a result.
//!
//! Single-valued fields (title, description, severity) keep one winner:
//! a native directive beats a legacy one, and within the same source the
//! later directive wins. List-valued fields keep every entry in declaration
//! order, system entries first.

use attest_config::LinkTemplates;
use attest_types::{Directive, DirectiveSource, Label, Link, Parameter, Severity, TestResult};

use crate::context::TestIdentity;
use crate::errors::MergeError;

/// Name of the parameter carrying the data set label.
pub const DATA_SET_PARAMETER: &str = "Data set";

#[derive(Debug)]
struct Slot<T> {
    value: Option<(DirectiveSource, T)>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self { value: None }
    }
}

impl<T> Slot<T> {
    fn offer(&mut self, source: DirectiveSource, value: T) {
        if self
            .value
            .as_ref()
            .is_none_or(|(current, _)| source >= *current)
        {
            self.value = Some((source, value));
        }
    }

    fn into_inner(self) -> Option<T> {
        self.value.map(|(_, value)| value)
    }
}

#[derive(Debug)]
struct Description {
    value: String,
    html: bool,
}

#[derive(Debug, Default)]
struct Merged {
    title: Slot<String>,
    description: Slot<Description>,
    severity: Slot<Severity>,
    labels: Vec<Label>,
    parameters: Vec<Parameter>,
    links: Vec<Link>,
}

impl Merged {
    fn collect(directives: &[Directive], templates: &LinkTemplates) -> Result<Self, MergeError> {
        let mut merged = Self::default();
        for directive in directives {
            let source = directive.source();
            match directive {
                Directive::Title { value, .. } => merged.title.offer(source, value.clone()),
                Directive::Description { value, html, .. } => merged.description.offer(
                    source,
                    Description {
                        value: value.clone(),
                        html: *html,
                    },
                ),
                Directive::Severity { level, .. } => merged.severity.offer(source, *level),
                Directive::Parameter {
                    name,
                    value,
                    excluded,
                    mode,
                    ..
                } => {
                    if name.is_empty() {
                        return Err(MergeError::EmptyParameterName);
                    }
                    merged.parameters.push(Parameter {
                        name: name.clone(),
                        value: value.clone(),
                        excluded: *excluded,
                        mode: *mode,
                    });
                }
                Directive::Label { name, value, .. } => {
                    if name.is_empty() {
                        return Err(MergeError::EmptyLabelName);
                    }
                    merged.labels.push(Label::new(name.as_str(), value.as_str()));
                }
                Directive::Story { value, .. } => {
                    merged.labels.push(Label::new(Label::STORY, value.as_str()));
                }
                Directive::Feature { value, .. } => {
                    merged.labels.push(Label::new(Label::FEATURE, value.as_str()));
                }
                Directive::Epic { value, .. } => {
                    merged.labels.push(Label::new(Label::EPIC, value.as_str()));
                }
                Directive::Link {
                    name,
                    url,
                    link_type,
                    ..
                } => {
                    let link =
                        resolve_link(name, url.as_deref(), link_type.as_deref(), templates)?;
                    merged.links.push(link);
                }
            }
        }
        Ok(merged)
    }
}

fn resolve_link(
    name: &str,
    url: Option<&str>,
    link_type: Option<&str>,
    templates: &LinkTemplates,
) -> Result<Link, MergeError> {
    let url = url
        .map(str::to_owned)
        .or_else(|| link_type.and_then(|link_type| templates.resolve(link_type, name)))
        .ok_or_else(|| MergeError::UnresolvedLink {
            name: name.to_owned(),
            link_type: link_type.map(str::to_owned),
        })?;
    Ok(Link {
        name: Some(name.to_owned()),
        url,
        link_type: link_type.map(str::to_owned),
    })
}

fn system_labels(identity: &TestIdentity) -> Vec<Label> {
    [
        (Label::TEST_CLASS, identity.class()),
        (Label::TEST_METHOD, identity.method()),
        (Label::HOST, identity.host()),
        (Label::THREAD, identity.thread()),
    ]
    .into_iter()
    .filter_map(|(name, value)| value.map(|value| Label::new(name, value)))
    .collect()
}

/// Enriches `result` with everything known about `identity`.
///
/// All directives are validated before `result` is touched, so a malformed
/// directive leaves the result as it was.
///
/// # Errors
///
/// Fails on a parameter or label directive with an empty name, or a link
/// with neither a url nor a template for its type.
pub fn set_info(
    result: &mut TestResult,
    identity: &TestIdentity,
    directives: &[Directive],
    templates: &LinkTemplates,
) -> Result<(), MergeError> {
    let merged = Merged::collect(directives, templates)?;

    result.name = Some(
        merged
            .title
            .into_inner()
            .unwrap_or_else(|| identity.name().into_owned()),
    );
    result.full_name = identity.full_name();
    if let Some(description) = merged.description.into_inner() {
        if description.html {
            result.description_html = Some(description.value);
            result.description = None;
        } else {
            result.description = Some(description.value);
            result.description_html = None;
        }
    }

    result.labels.extend(system_labels(identity));
    result.labels.extend(merged.labels);
    if let Some(severity) = merged.severity.into_inner() {
        result
            .labels
            .push(Label::new(Label::SEVERITY, severity.as_str()));
    }

    if let Some(data_label) = identity.data_label() {
        result
            .parameters
            .push(Parameter::new(DATA_SET_PARAMETER, data_label));
    }
    result.parameters.extend(merged.parameters);
    result.links.extend(merged.links);
    Ok(())
}
