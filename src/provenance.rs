use chrono::{Local, NaiveDate};
use serde_json::{Value, json};

pub const PRODUCT: &str = "TransFAIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceTag {
    code: String,
}

impl ProvenanceTag {
    pub fn new(version: &str, pipeline: &str) -> Self {
        Self::on_date(version, pipeline, Local::now().date_naive())
    }

    pub fn on_date(version: &str, pipeline: &str, date: NaiveDate) -> Self {
        Self {
            code: format!("{PRODUCT} {version} - {} - {pipeline}", date.format("%Y-%m-%d")),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn apply(&self, mut resource: Value) -> Value {
        let Some(object) = resource.as_object_mut() else {
            return resource;
        };
        let meta = object.entry("meta").or_insert_with(|| json!({}));
        if !meta.is_object() {
            *meta = json!({});
        }
        if let Some(meta) = meta.as_object_mut() {
            let tags = meta.entry("tag").or_insert_with(|| json!([]));
            if !tags.is_array() {
                *tags = json!([]);
            }
            if let Some(tags) = tags.as_array_mut() {
                tags.push(json!({ "code": self.code }));
            }
        }
        resource
    }
}
