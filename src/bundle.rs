use serde_json::{Value, json};
use uuid::Uuid;

use crate::domain::id_part;
use crate::fhir::{resource_kind, str_at};

#[derive(Debug, Clone)]
pub struct Bundle {
    id: Uuid,
    entries: Vec<Value>,
}

impl Default for Bundle {
    fn default() -> Self {
        Self::new()
    }
}

impl Bundle {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            entries: Vec::new(),
        }
    }

    pub fn id(&self) -> String {
        self.id.to_string()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resources(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter()
    }

    pub fn push(&mut self, resource: Value) {
        self.entries.push(resource);
    }

    pub fn to_json(&self) -> Value {
        let entries: Vec<Value> = self.entries.iter().map(entry).collect();
        json!({
            "resourceType": "Bundle",
            "id": self.id(),
            "type": "transaction",
            "entry": entries,
        })
    }
}

fn entry(resource: &Value) -> Value {
    let kind = resource_kind(resource).unwrap_or_default();
    match str_at(resource, &["id"]).filter(|id| !id.trim().is_empty()) {
        Some(id) => json!({
            "fullUrl": id,
            "resource": resource,
            "request": { "method": "PUT", "url": format!("{kind}/{}", id_part(id)) },
        }),
        None => json!({
            "fullUrl": format!("urn:uuid:{}", Uuid::new_v4()),
            "resource": resource,
            "request": { "method": "POST", "url": kind },
        }),
    }
}
