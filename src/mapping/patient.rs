use serde_json::{Value, json};

use crate::domain::ResourceKind;
use crate::error::TransferError;
use crate::fhir::{expect_resource, meta_with_profile, non_empty};
use crate::mapping::{LinkedId, Mapping};
use crate::profiles::{BBMRI_PATIENT, MII_PATIENT};

const GENDERS: [&str; 4] = ["male", "female", "other", "unknown"];

#[derive(Debug, Default)]
pub struct PatientMapping {
    id: LinkedId,
    birth_date: Option<String>,
    gender: Option<String>,
    deceased: bool,
    deceased_at: Option<String>,
}

impl PatientMapping {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_common(&mut self, resource: &Value) -> Result<Option<String>, TransferError> {
        let object = expect_resource(resource, ResourceKind::Patient)?;
        self.birth_date = non_empty(object.get("birthDate").and_then(Value::as_str));
        self.gender = non_empty(object.get("gender").and_then(Value::as_str));
        self.deceased_at = non_empty(object.get("deceasedDateTime").and_then(Value::as_str));
        self.deceased = self.deceased_at.is_some()
            || object.get("deceasedBoolean").and_then(Value::as_bool) == Some(true);
        Ok(non_empty(object.get("id").and_then(Value::as_str)))
    }

    fn build(&self, profile: &str, id: Option<&str>) -> Result<Value, TransferError> {
        let mut patient = json!({
            "resourceType": "Patient",
            "meta": meta_with_profile(profile),
        });
        if let Some(id) = id {
            patient["id"] = Value::from(id);
        }
        if let Some(gender) = &self.gender {
            if !GENDERS.contains(&gender.as_str()) {
                return Err(TransferError::UnknownGender(gender.clone()));
            }
            patient["gender"] = Value::from(gender.as_str());
        }
        if let Some(birth_date) = &self.birth_date {
            patient["birthDate"] = Value::from(birth_date.as_str());
        }
        if self.deceased {
            match &self.deceased_at {
                Some(at) => patient["deceasedDateTime"] = Value::from(at.as_str()),
                None => patient["deceasedBoolean"] = Value::Bool(true),
            }
        }
        Ok(patient)
    }
}

impl Mapping for PatientMapping {
    fn from_bbmri(&mut self, resource: &Value) -> Result<(), TransferError> {
        let id = self.read_common(resource)?;
        self.id.set_bbmri(id);
        Ok(())
    }

    fn from_mii(&mut self, resource: &Value) -> Result<(), TransferError> {
        let id = self.read_common(resource)?;
        self.id.set_mii(id);
        Ok(())
    }

    fn to_bbmri(&self) -> Result<Option<Value>, TransferError> {
        self.build(BBMRI_PATIENT, self.id.for_bbmri()).map(Some)
    }

    fn to_mii(&self) -> Result<Option<Value>, TransferError> {
        self.build(MII_PATIENT, self.id.for_mii()).map(Some)
    }
}
