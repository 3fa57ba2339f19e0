//! Stable ids for a test case and for its run history.
//!
//! Both ids are md5 digests of `::`-joined strings so they survive process
//! restarts and match what report renderers expect. Parameter order is kept
//! as given: the same values in a different order are a different case.

use attest_types::Parameter;
use log::trace;
use md5::{Digest, Md5};

pub const SEPARATOR: &str = "::";

fn included(parameters: &[Parameter]) -> impl Iterator<Item = &Parameter> {
    parameters.iter().filter(|parameter| !parameter.excluded)
}

fn digest(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

/// Groups every run of `name` declaring the same (non-excluded) parameter
/// names.
#[must_use]
pub fn test_case_id(name: &str, parameters: &[Parameter]) -> String {
    let names: Vec<&str> = included(parameters)
        .map(|parameter| parameter.name.as_str())
        .collect();
    let id = digest(&format!("{name}{SEPARATOR}{}", names.join(SEPARATOR)));
    trace!("test case id for {name}: {id}");
    id
}

/// Groups every run of `name` with the same (non-excluded) parameter values.
/// The test case id is folded in, so equal values under different parameter
/// names never share a history.
#[must_use]
pub fn history_id(name: &str, parameters: &[Parameter]) -> String {
    let case_id = test_case_id(name, parameters);
    let values: Vec<&str> = included(parameters)
        .map(|parameter| parameter.value.as_str())
        .collect();
    let id = digest(&format!(
        "{case_id}{SEPARATOR}{name}{SEPARATOR}{}",
        values.join(SEPARATOR)
    ));
    trace!("history id for {name}: {id}");
    id
}
