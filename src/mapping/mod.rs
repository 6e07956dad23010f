pub mod biobank;
pub mod cause_of_death;
pub mod collection;
pub mod condition;
pub mod patient;
pub mod specimen;

use serde_json::{Value, json};

use crate::error::TransferError;
use crate::fhir::{code_of, non_empty, system_of};
use crate::profiles::{ICD_10_GM, ICD_10_GM_LEGACY};

pub use biobank::BiobankMapping;
pub use cause_of_death::CauseOfDeathMapping;
pub use collection::CollectionMapping;
pub use condition::ConditionMapping;
pub use patient::PatientMapping;
pub use specimen::SpecimenMapping;

/// `to_*` returning `Ok(None)` means the record must not be emitted towards
/// that profile; callers skip it, it is not a failure.
pub trait Mapping {
    fn from_bbmri(&mut self, resource: &Value) -> Result<(), TransferError>;
    fn from_mii(&mut self, resource: &Value) -> Result<(), TransferError>;
    fn to_bbmri(&self) -> Result<Option<Value>, TransferError>;
    fn to_mii(&self) -> Result<Option<Value>, TransferError>;
}

/// An identifier as seen by each profile.
///
/// When the side being written is empty the other side is used, which is the
/// only identity link between source and target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkedId {
    bbmri: Option<String>,
    mii: Option<String>,
}

impl LinkedId {
    pub fn set_bbmri(&mut self, value: Option<String>) {
        self.bbmri = value;
    }

    pub fn set_mii(&mut self, value: Option<String>) {
        self.mii = value;
    }

    pub fn for_bbmri(&self) -> Option<&str> {
        self.bbmri.as_deref().or(self.mii.as_deref())
    }

    pub fn for_mii(&self) -> Option<&str> {
        self.mii.as_deref().or(self.bbmri.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.bbmri.is_none() && self.mii.is_none()
    }
}

/// The legacy DIMDI ICD-10-GM system is read as the BfArM one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coded {
    pub system: Option<String>,
    pub code: String,
    pub version: Option<String>,
}

impl Coded {
    pub fn from_coding(coding: &Value) -> Option<Self> {
        let code = non_empty(code_of(coding))?;
        Some(Self {
            system: non_empty(system_of(coding)).map(|system| {
                if system == ICD_10_GM_LEGACY {
                    ICD_10_GM.to_string()
                } else {
                    system
                }
            }),
            code,
            version: non_empty(coding.get("version").and_then(Value::as_str)),
        })
    }

    pub fn to_coding(&self) -> Value {
        let mut coding = json!({ "code": self.code });
        if let Some(system) = &self.system {
            coding["system"] = Value::from(system.as_str());
        }
        if let Some(version) = &self.version {
            coding["version"] = Value::from(version.as_str());
        }
        coding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linked_id_falls_back_to_other_side() {
        let mut id = LinkedId::default();
        id.set_bbmri(Some("p-1".to_string()));
        assert_eq!(id.for_mii(), Some("p-1"));

        id.set_mii(Some("m-1".to_string()));
        assert_eq!(id.for_mii(), Some("m-1"));
        assert_eq!(id.for_bbmri(), Some("p-1"));
    }

    #[test]
    fn legacy_gm_system_is_normalised() {
        let coded = Coded::from_coding(&json!({
            "system": ICD_10_GM_LEGACY,
            "version": "2019",
            "code": "C50.9"
        }))
        .unwrap();
        assert_eq!(coded.system.as_deref(), Some(ICD_10_GM));
        assert_eq!(coded.to_coding()["version"], "2019");
        assert!(Coded::from_coding(&json!({ "system": ICD_10_GM })).is_none());
    }
}
