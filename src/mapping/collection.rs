use serde_json::Value;

use crate::error::TransferError;
use crate::fhir::{non_empty, reference, reference_of};
use crate::mapping::Mapping;
use crate::mapping::biobank::{BiobankMapping, Dialect};
use crate::profiles::{BBMRI_COLLECTION, MII_ORGANIZATION};

#[derive(Debug, Default)]
pub struct CollectionMapping {
    organization: BiobankMapping,
    part_of: Option<String>,
}

impl CollectionMapping {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&mut self, resource: &Value, dialect: Dialect) -> Result<(), TransferError> {
        self.organization.read(resource, dialect)?;
        self.part_of = non_empty(reference_of(resource.get("partOf")));
        Ok(())
    }

    fn write(&self, profile: &str, dialect: Dialect) -> Value {
        let mut collection = self.organization.write(profile, dialect);
        if let Some(parent) = &self.part_of {
            collection["partOf"] = reference(parent);
        }
        collection
    }
}

impl Mapping for CollectionMapping {
    fn from_bbmri(&mut self, resource: &Value) -> Result<(), TransferError> {
        self.read(resource, Dialect::Bbmri)
    }

    fn from_mii(&mut self, resource: &Value) -> Result<(), TransferError> {
        self.read(resource, Dialect::Mii)
    }

    fn to_bbmri(&self) -> Result<Option<Value>, TransferError> {
        Ok(Some(self.write(BBMRI_COLLECTION, Dialect::Bbmri)))
    }

    fn to_mii(&self) -> Result<Option<Value>, TransferError> {
        Ok(Some(self.write(MII_ORGANIZATION, Dialect::Mii)))
    }
}
