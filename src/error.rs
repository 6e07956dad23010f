use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::ResourceKind;

#[derive(Debug, Error, Diagnostic)]
pub enum TransferError {
    #[error("invalid pipeline profile: {0} (expected BBMRI2MII, MII2BBMRI or BBMRI2BBMRI)")]
    InvalidPipeline(String),

    #[error("invalid start resource: {0} (expected Patient or Specimen)")]
    InvalidStartResource(String),

    #[error("unsupported resource kind: {0}")]
    InvalidResourceKind(String),

    #[error("transfer not configured: missing {0}")]
    #[diagnostic(help("set it in transfair.json, on the command line or in the environment"))]
    NotConfigured(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("FHIR request failed: {0}")]
    FhirHttp(String),

    #[error("FHIR server returned status {status}: {message}")]
    FhirStatus { status: u16, message: String },

    #[error("malformed {kind} resource: {reason}")]
    MalformedResource { kind: ResourceKind, reason: String },

    #[error("unknown administrative gender: {0}")]
    UnknownGender(String),

    #[error("export failed: {0}")]
    Export(String),
}

impl TransferError {
    pub fn malformed(kind: ResourceKind, reason: impl Into<String>) -> Self {
        TransferError::MalformedResource {
            kind,
            reason: reason.into(),
        }
    }
}
