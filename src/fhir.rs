use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value, json};

use crate::domain::ResourceKind;
use crate::error::TransferError;

/// Checks that `resource` is a JSON object of the expected kind.
///
/// A missing `resourceType` is tolerated; a different one is not.
pub fn expect_resource(
    resource: &Value,
    kind: ResourceKind,
) -> Result<&Map<String, Value>, TransferError> {
    let object = resource
        .as_object()
        .ok_or_else(|| TransferError::malformed(kind, "resource is not a JSON object"))?;
    match object.get("resourceType").and_then(Value::as_str) {
        None => Ok(object),
        Some(found) if found == kind.as_str() => Ok(object),
        Some(found) => Err(TransferError::malformed(
            kind,
            format!("unexpected resourceType {found}"),
        )),
    }
}

pub fn resource_kind(resource: &Value) -> Option<&str> {
    resource.get("resourceType").and_then(Value::as_str)
}

pub fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    value_at(value, path).and_then(Value::as_str)
}

pub fn value_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}

pub fn array<'a>(value: Option<&'a Value>) -> impl Iterator<Item = &'a Value> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter())
        .into_iter()
        .flatten()
}

pub fn codings(concept: Option<&Value>) -> impl Iterator<Item = &Value> {
    array(concept.and_then(|concept| concept.get("coding")))
}

pub fn first_coding(concept: Option<&Value>) -> Option<&Value> {
    codings(concept).next()
}

pub fn code_of(coding: &Value) -> Option<&str> {
    coding.get("code").and_then(Value::as_str)
}

pub fn system_of(coding: &Value) -> Option<&str> {
    coding.get("system").and_then(Value::as_str)
}

pub fn extensions(value: &Value) -> impl Iterator<Item = &Value> {
    array(value.get("extension"))
}

pub fn extension_url(extension: &Value) -> Option<&str> {
    extension.get("url").and_then(Value::as_str)
}

pub fn extension_value<'a>(value: &'a Value, url: &str, field: &str) -> Option<&'a Value> {
    extensions(value)
        .find(|extension| extension_url(extension) == Some(url))
        .and_then(|extension| extension.get(field))
}

pub fn has_profile(resource: &Value, profile: &str) -> bool {
    array(value_at(resource, &["meta", "profile"])).any(|item| item.as_str() == Some(profile))
}

pub fn reference_of(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(|reference| reference.get("reference"))
        .and_then(Value::as_str)
}

pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub fn coding(system: &str, code: &str) -> Value {
    json!({ "system": system, "code": code })
}

pub fn concept(system: &str, code: &str) -> Value {
    json!({ "coding": [coding(system, code)] })
}

pub fn reference(target: &str) -> Value {
    json!({ "reference": target })
}

pub fn meta_with_profile(profile: &str) -> Value {
    json!({ "profile": [profile] })
}

/// Parses a FHIR `dateTime`, accepting the reduced precisions the type allows.
///
/// Partial dates resolve to the start of the period in UTC.
pub fn parse_date_time(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed);
    }
    let utc = FixedOffset::east_opt(0)?;
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return naive.and_local_timezone(utc).single();
    }
    let date = match value.len() {
        4 => NaiveDate::parse_from_str(&format!("{value}-01-01"), "%Y-%m-%d").ok(),
        7 => NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d").ok(),
        _ => NaiveDate::parse_from_str(value, "%Y-%m-%d").ok(),
    }?;
    date.and_hms_opt(0, 0, 0)?.and_local_timezone(utc).single()
}
