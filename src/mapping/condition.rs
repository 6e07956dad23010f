use serde_json::{Value, json};
use tracing::{debug, info};

use crate::domain::ResourceKind;
use crate::error::TransferError;
use crate::fhir::{codings, expect_resource, meta_with_profile, non_empty, reference, reference_of};
use crate::mapping::{Coded, LinkedId, Mapping};
use crate::profiles::{
    BBMRI_CONDITION, ICD_9, ICD_10_GM, ICD_10_WHO, MII_DIAGNOSIS, SNOMED,
};

#[derive(Debug, Default)]
pub struct ConditionMapping {
    id: LinkedId,
    subject: LinkedId,
    onset: Option<String>,
    icd10_who: Option<Coded>,
    icd10_gm: Option<Coded>,
    icd9: Option<Coded>,
    snomed: Option<Coded>,
}

impl ConditionMapping {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&mut self, resource: &Value) -> Result<(Option<String>, Option<String>), TransferError> {
        let object = expect_resource(resource, ResourceKind::Condition)?;
        self.onset = non_empty(object.get("onsetDateTime").and_then(Value::as_str));

        for coding in codings(object.get("code")) {
            let Some(coded) = Coded::from_coding(coding) else {
                continue;
            };
            let slot = match coded.system.as_deref() {
                Some(ICD_10_WHO) => &mut self.icd10_who,
                Some(ICD_10_GM) => &mut self.icd10_gm,
                Some(ICD_9) => &mut self.icd9,
                Some(SNOMED) => &mut self.snomed,
                other => {
                    info!(system = ?other, code = %coded.code, "unsupported diagnosis coding ignored");
                    continue;
                }
            };
            if slot.is_none() {
                *slot = Some(coded);
            }
        }

        let id = non_empty(object.get("id").and_then(Value::as_str));
        let subject = non_empty(reference_of(object.get("subject")));
        Ok((id, subject))
    }

    fn build(&self, profile: &str, id: Option<&str>, subject: Option<&str>) -> Value {
        let mut condition = json!({
            "resourceType": "Condition",
            "meta": meta_with_profile(profile),
        });
        if let Some(id) = id {
            condition["id"] = Value::from(id);
        }
        if let Some(subject) = subject {
            condition["subject"] = reference(subject);
        }
        if let Some(onset) = &self.onset {
            condition["onsetDateTime"] = Value::from(onset.as_str());
        }
        condition
    }

    fn log_dropped(&self) {
        if let Some(coded) = &self.icd9 {
            debug!(code = %coded.code, "ICD-9 diagnosis has no target coding");
        }
        if let Some(coded) = &self.snomed {
            info!(code = %coded.code, "SNOMED diagnoses are not supported");
        }
    }
}

impl Mapping for ConditionMapping {
    fn from_bbmri(&mut self, resource: &Value) -> Result<(), TransferError> {
        let (id, subject) = self.read(resource)?;
        self.id.set_bbmri(id);
        self.subject.set_bbmri(subject);
        Ok(())
    }

    fn from_mii(&mut self, resource: &Value) -> Result<(), TransferError> {
        let (id, subject) = self.read(resource)?;
        self.id.set_mii(id);
        self.subject.set_mii(subject);
        Ok(())
    }

    fn to_bbmri(&self) -> Result<Option<Value>, TransferError> {
        let mut condition = self.build(BBMRI_CONDITION, self.id.for_bbmri(), self.subject.for_bbmri());
        let codings: Vec<Value> = [&self.icd10_gm, &self.icd10_who]
            .into_iter()
            .flatten()
            .map(Coded::to_coding)
            .collect();
        if codings.is_empty() {
            self.log_dropped();
        } else {
            condition["code"] = json!({ "coding": codings });
        }
        Ok(Some(condition))
    }

    fn to_mii(&self) -> Result<Option<Value>, TransferError> {
        let mut condition = self.build(MII_DIAGNOSIS, self.id.for_mii(), self.subject.for_mii());
        match self.icd10_gm.as_ref().or(self.icd10_who.as_ref()) {
            Some(coded) => condition["code"] = json!({ "coding": [coded.to_coding()] }),
            None => self.log_dropped(),
        }
        Ok(Some(condition))
    }
}
