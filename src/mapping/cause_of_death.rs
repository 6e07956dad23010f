use serde_json::{Value, json};

use crate::domain::ResourceKind;
use crate::error::TransferError;
use crate::fhir::{codings, concept, expect_resource, meta_with_profile, non_empty, reference, reference_of};
use crate::mapping::{Coded, LinkedId, Mapping};
use crate::profiles::{
    BBMRI_CAUSE_OF_DEATH, ICD_10_GM, ICD_10_WHO, LOINC,
    LOINC_CAUSE_OF_DEATH_CATEGORY, LOINC_CAUSE_OF_DEATH_OBSERVATION, MII_CAUSE_OF_DEATH, SNOMED,
    SNOMED_CAUSE_OF_DEATH_CATEGORY,
};

#[derive(Debug, Default)]
pub struct CauseOfDeathMapping {
    id: LinkedId,
    subject: LinkedId,
    cause: Option<String>,
}

fn icd10_code(concept: Option<&Value>) -> Option<String> {
    codings(concept)
        .filter_map(Coded::from_coding)
        .find(|coded| {
            matches!(
                coded.system.as_deref(),
                Some(ICD_10_WHO | ICD_10_GM)
            )
        })
        .map(|coded| coded.code)
}

impl CauseOfDeathMapping {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_blank(&self) -> bool {
        self.id.is_empty() && self.subject.is_empty() && self.cause.is_none()
    }
}

impl Mapping for CauseOfDeathMapping {
    fn from_bbmri(&mut self, resource: &Value) -> Result<(), TransferError> {
        let object = expect_resource(resource, ResourceKind::Observation)?;
        self.id.set_bbmri(non_empty(object.get("id").and_then(Value::as_str)));
        self.subject.set_bbmri(non_empty(reference_of(object.get("subject"))));
        self.cause = icd10_code(object.get("valueCodeableConcept"));
        Ok(())
    }

    fn from_mii(&mut self, resource: &Value) -> Result<(), TransferError> {
        let object = expect_resource(resource, ResourceKind::Condition)?;
        self.id.set_mii(non_empty(object.get("id").and_then(Value::as_str)));
        self.subject.set_mii(non_empty(reference_of(object.get("subject"))));
        self.cause = icd10_code(object.get("code"));
        Ok(())
    }

    fn to_bbmri(&self) -> Result<Option<Value>, TransferError> {
        if self.is_blank() {
            return Ok(None);
        }
        let mut observation = json!({
            "resourceType": "Observation",
            "meta": meta_with_profile(BBMRI_CAUSE_OF_DEATH),
            "status": "final",
            "code": concept(LOINC, LOINC_CAUSE_OF_DEATH_OBSERVATION),
        });
        if let Some(id) = self.id.for_bbmri() {
            observation["id"] = Value::from(id);
        }
        if let Some(subject) = self.subject.for_bbmri() {
            observation["subject"] = reference(subject);
        }
        if let Some(cause) = &self.cause {
            observation["valueCodeableConcept"] = concept(ICD_10_WHO, cause);
        }
        Ok(Some(observation))
    }

    fn to_mii(&self) -> Result<Option<Value>, TransferError> {
        if self.is_blank() {
            return Ok(None);
        }
        let mut condition = json!({
            "resourceType": "Condition",
            "meta": meta_with_profile(MII_CAUSE_OF_DEATH),
            "category": [
                concept(LOINC, LOINC_CAUSE_OF_DEATH_CATEGORY),
                concept(SNOMED, SNOMED_CAUSE_OF_DEATH_CATEGORY),
            ],
        });
        if let Some(id) = self.id.for_mii() {
            condition["id"] = Value::from(id);
        }
        if let Some(subject) = self.subject.for_mii() {
            condition["subject"] = reference(subject);
        }
        if let Some(cause) = &self.cause {
            condition["code"] = concept(ICD_10_WHO, cause);
        }
        Ok(Some(condition))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_record_is_not_emitted() {
        let mut mapping = CauseOfDeathMapping::new();
        mapping
            .from_bbmri(&json!({ "resourceType": "Observation" }))
            .unwrap();
        assert_eq!(mapping.to_mii().unwrap(), None);
        assert_eq!(mapping.to_bbmri().unwrap(), None);
    }

    #[test]
    fn observation_becomes_categorised_condition() {
        let mut mapping = CauseOfDeathMapping::new();
        mapping
            .from_bbmri(&json!({
                "resourceType": "Observation",
                "id": "cod-1",
                "subject": { "reference": "Patient/p-1" },
                "code": { "coding": [{ "system": LOINC, "code": "68343-3" }] },
                "valueCodeableConcept": { "coding": [{ "system": ICD_10_WHO, "code": "I21.9" }] }
            }))
            .unwrap();

        let condition = mapping.to_mii().unwrap().unwrap();
        assert_eq!(condition["resourceType"], "Condition");
        assert_eq!(condition["code"]["coding"][0]["code"], "I21.9");
        assert_eq!(condition["category"][1]["coding"][0]["code"], "16100001");
        assert_eq!(condition["subject"]["reference"], "Patient/p-1");
    }
}
