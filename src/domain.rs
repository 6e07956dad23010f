use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::TransferError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineKind {
    #[serde(rename = "BBMRI2MII")]
    Bbmri2Mii,
    #[serde(rename = "MII2BBMRI")]
    Mii2Bbmri,
    #[serde(rename = "BBMRI2BBMRI")]
    Bbmri2Bbmri,
}

impl PipelineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineKind::Bbmri2Mii => "BBMRI2MII",
            PipelineKind::Mii2Bbmri => "MII2BBMRI",
            PipelineKind::Bbmri2Bbmri => "BBMRI2BBMRI",
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineKind {
    type Err = TransferError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "BBMRI2MII" => Ok(PipelineKind::Bbmri2Mii),
            "MII2BBMRI" => Ok(PipelineKind::Mii2Bbmri),
            "BBMRI2BBMRI" => Ok(PipelineKind::Bbmri2Bbmri),
            _ => Err(TransferError::InvalidPipeline(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StartResource {
    #[default]
    Patient,
    Specimen,
}

impl fmt::Display for StartResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartResource::Patient => write!(f, "Patient"),
            StartResource::Specimen => write!(f, "Specimen"),
        }
    }
}

impl FromStr for StartResource {
    type Err = TransferError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "patient" => Ok(StartResource::Patient),
            "specimen" => Ok(StartResource::Specimen),
            _ => Err(TransferError::InvalidStartResource(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Patient,
    Condition,
    Specimen,
    Observation,
    Organization,
    OrganizationAffiliation,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Patient => "Patient",
            ResourceKind::Condition => "Condition",
            ResourceKind::Specimen => "Specimen",
            ResourceKind::Observation => "Observation",
            ResourceKind::Organization => "Organization",
            ResourceKind::OrganizationAffiliation => "OrganizationAffiliation",
        }
    }

    pub fn patient_scoped() -> [ResourceKind; 4] {
        [
            ResourceKind::Patient,
            ResourceKind::Condition,
            ResourceKind::Specimen,
            ResourceKind::Observation,
        ]
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = TransferError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Patient" => Ok(ResourceKind::Patient),
            "Condition" => Ok(ResourceKind::Condition),
            "Specimen" => Ok(ResourceKind::Specimen),
            "Observation" => Ok(ResourceKind::Observation),
            "Organization" => Ok(ResourceKind::Organization),
            "OrganizationAffiliation" => Ok(ResourceKind::OrganizationAffiliation),
            _ => Err(TransferError::InvalidResourceKind(value.to_string())),
        }
    }
}

static REFERENCE_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|/)[A-Z][A-Za-z]+/([A-Za-z0-9\-.]{1,64})(?:/_history/[^/]+)?$").unwrap()
});

/// Reduces a literal reference or absolute resource URL to its id part.
///
/// `Patient/123`, `http://host/fhir/Patient/123/_history/2` and a bare `123`
/// all yield `123`.
pub fn id_part(reference: &str) -> &str {
    let trimmed = reference.trim();
    match REFERENCE_TAIL.captures(trimmed).and_then(|caps| caps.get(1)) {
        Some(id) => id.as_str(),
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_pipeline_ignores_case() {
        let kind: PipelineKind = "mii2bbmri".parse().unwrap();
        assert_eq!(kind, PipelineKind::Mii2Bbmri);
        assert_eq!(kind.to_string(), "MII2BBMRI");
    }

    #[test]
    fn parse_pipeline_invalid() {
        let err = "BBMRI2FOO".parse::<PipelineKind>().unwrap_err();
        assert_matches!(err, TransferError::InvalidPipeline(_));
    }

    #[test]
    fn parse_start_resource() {
        assert_eq!(
            "Specimen".parse::<StartResource>().unwrap(),
            StartResource::Specimen
        );
        assert_matches!(
            "Condition".parse::<StartResource>(),
            Err(TransferError::InvalidStartResource(_))
        );
    }

    #[test]
    fn id_part_variants() {
        assert_eq!(id_part("Patient/123"), "123");
        assert_eq!(id_part("http://blaze:8080/fhir/Patient/abc-1/_history/2"), "abc-1");
        assert_eq!(id_part("123"), "123");
        assert_eq!(id_part(" Specimen/s.1 "), "s.1");
    }
}
