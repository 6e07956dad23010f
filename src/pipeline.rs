use serde_json::Value;
use tracing::{debug, info};

use crate::domain::{PipelineKind, ResourceKind};
use crate::error::TransferError;
use crate::mapping::{
    BiobankMapping, CauseOfDeathMapping, CollectionMapping, ConditionMapping, Mapping,
    PatientMapping, SpecimenMapping,
};
use crate::profiles::{
    is_bbmri_biobank, is_bbmri_cause_of_death, is_bbmri_collection, is_mii_cause_of_death,
};

pub trait Pipeline: Send + Sync {
    fn kind(&self) -> PipelineKind;

    fn organization_kinds(&self) -> &'static [ResourceKind] {
        &[ResourceKind::Organization]
    }

    fn transfers_organizations_by_default(&self) -> bool {
        false
    }

    /// Converts one source resource. `Ok(None)` means it is not emitted.
    fn convert(&self, kind: ResourceKind, resource: &Value)
    -> Result<Option<Value>, TransferError>;
}

pub fn pipeline_for(kind: PipelineKind) -> Box<dyn Pipeline> {
    match kind {
        PipelineKind::Bbmri2Mii => Box::new(Bbmri2Mii),
        PipelineKind::Mii2Bbmri => Box::new(Mii2Bbmri),
        PipelineKind::Bbmri2Bbmri => Box::new(Bbmri2Bbmri),
    }
}

fn bbmri_to_mii<M: Mapping>(mut mapping: M, resource: &Value) -> Result<Option<Value>, TransferError> {
    mapping.from_bbmri(resource)?;
    mapping.to_mii()
}

fn mii_to_bbmri<M: Mapping>(mut mapping: M, resource: &Value) -> Result<Option<Value>, TransferError> {
    mapping.from_mii(resource)?;
    mapping.to_bbmri()
}

fn resource_id(resource: &Value) -> Option<&str> {
    resource.get("id").and_then(Value::as_str)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Bbmri2Mii;

impl Pipeline for Bbmri2Mii {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Bbmri2Mii
    }

    fn convert(
        &self,
        kind: ResourceKind,
        resource: &Value,
    ) -> Result<Option<Value>, TransferError> {
        match kind {
            ResourceKind::Patient => bbmri_to_mii(PatientMapping::new(), resource),
            ResourceKind::Specimen => bbmri_to_mii(SpecimenMapping::new(), resource),
            ResourceKind::Condition => bbmri_to_mii(ConditionMapping::new(), resource),
            ResourceKind::Observation if is_bbmri_cause_of_death(resource) => {
                bbmri_to_mii(CauseOfDeathMapping::new(), resource)
            }
            ResourceKind::Organization if is_bbmri_biobank(resource) => {
                bbmri_to_mii(BiobankMapping::new(), resource)
            }
            ResourceKind::Organization if is_bbmri_collection(resource) => {
                bbmri_to_mii(CollectionMapping::new(), resource)
            }
            ResourceKind::Organization => {
                info!(id = ?resource_id(resource), "organization is neither biobank nor collection; skipped");
                Ok(None)
            }
            other => {
                debug!(kind = %other, id = ?resource_id(resource), "no MII counterpart; skipped");
                Ok(None)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Mii2Bbmri;

impl Pipeline for Mii2Bbmri {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Mii2Bbmri
    }

    fn convert(
        &self,
        kind: ResourceKind,
        resource: &Value,
    ) -> Result<Option<Value>, TransferError> {
        match kind {
            ResourceKind::Patient => mii_to_bbmri(PatientMapping::new(), resource),
            ResourceKind::Specimen => mii_to_bbmri(SpecimenMapping::new(), resource),
            ResourceKind::Condition if is_mii_cause_of_death(resource) => {
                mii_to_bbmri(CauseOfDeathMapping::new(), resource)
            }
            ResourceKind::Condition => mii_to_bbmri(ConditionMapping::new(), resource),
            ResourceKind::Organization if resource.get("partOf").is_some() => {
                mii_to_bbmri(CollectionMapping::new(), resource)
            }
            ResourceKind::Organization => mii_to_bbmri(BiobankMapping::new(), resource),
            other => {
                debug!(kind = %other, id = ?resource_id(resource), "no bbmri counterpart; skipped");
                Ok(None)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Bbmri2Bbmri;

impl Pipeline for Bbmri2Bbmri {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Bbmri2Bbmri
    }

    fn organization_kinds(&self) -> &'static [ResourceKind] {
        &[
            ResourceKind::Organization,
            ResourceKind::OrganizationAffiliation,
        ]
    }

    fn transfers_organizations_by_default(&self) -> bool {
        true
    }

    fn convert(
        &self,
        _kind: ResourceKind,
        resource: &Value,
    ) -> Result<Option<Value>, TransferError> {
        Ok(Some(resource.clone()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::profiles::{BBMRI_BIOBANK, MII_CAUSE_OF_DEATH, MII_DIAGNOSIS, SNOMED};

    #[test]
    fn mii_death_category_goes_to_cause_of_death() {
        let condition = json!({
            "resourceType": "Condition",
            "id": "c-1",
            "category": [{ "coding": [{ "system": SNOMED, "code": "16100001" }] }],
            "code": { "coding": [{ "system": "http://hl7.org/fhir/sid/icd-10", "code": "I21.9" }] }
        });
        let converted = Mii2Bbmri
            .convert(ResourceKind::Condition, &condition)
            .unwrap()
            .unwrap();
        assert_eq!(converted["resourceType"], "Observation");
    }

    #[test]
    fn bbmri_condition_becomes_diagnosis() {
        let condition = json!({ "resourceType": "Condition", "id": "c-2" });
        let converted = Bbmri2Mii
            .convert(ResourceKind::Condition, &condition)
            .unwrap()
            .unwrap();
        assert_eq!(converted["meta"]["profile"][0], MII_DIAGNOSIS);
        assert_ne!(converted["meta"]["profile"][0], MII_CAUSE_OF_DEATH);
    }

    #[test]
    fn plain_observation_is_not_emitted() {
        let observation = json!({ "resourceType": "Observation", "id": "o-1" });
        assert_eq!(
            Bbmri2Mii
                .convert(ResourceKind::Observation, &observation)
                .unwrap(),
            None
        );
    }

    #[test]
    fn unprofiled_organization_is_skipped() {
        let organization = json!({ "resourceType": "Organization", "id": "org-1" });
        assert_eq!(
            Bbmri2Mii
                .convert(ResourceKind::Organization, &organization)
                .unwrap(),
            None
        );
        let biobank = json!({
            "resourceType": "Organization",
            "meta": { "profile": [BBMRI_BIOBANK] }
        });
        assert!(
            Bbmri2Mii
                .convert(ResourceKind::Organization, &biobank)
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn passthrough_copies_resource() {
        let specimen = json!({ "resourceType": "Specimen", "id": "s-1", "note": [{ "text": "x" }] });
        let copied = Bbmri2Bbmri
            .convert(ResourceKind::Specimen, &specimen)
            .unwrap()
            .unwrap();
        assert_eq!(copied, specimen);
    }
}
