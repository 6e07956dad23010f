use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::bundle::Bundle;
use crate::client::{FHIR_JSON, authorize, handle_status, http_client};
use crate::config::Endpoint;
use crate::error::TransferError;

pub trait BundleSink: Send + Sync {
    fn export(&self, bundle: &Bundle) -> Result<(), TransferError>;
}

impl<T: BundleSink + ?Sized> BundleSink for &T {
    fn export(&self, bundle: &Bundle) -> Result<(), TransferError> {
        (**self).export(bundle)
    }
}

/// Writes each bundle as pretty JSON to `{prefix}{bundle id}.json`.
///
/// The prefix is used verbatim, so a directory prefix needs its trailing
/// separator.
#[derive(Debug, Clone)]
pub struct FileSink {
    prefix: String,
}

impl FileSink {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn path_for(&self, bundle: &Bundle) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{}{}.json", self.prefix, bundle.id()))
    }
}

fn export_error(path: &Utf8Path, err: impl std::fmt::Display) -> TransferError {
    TransferError::Export(format!("{path}: {err}"))
}

impl BundleSink for FileSink {
    fn export(&self, bundle: &Bundle) -> Result<(), TransferError> {
        let path = self.path_for(bundle);
        let parent = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
            _ => Utf8PathBuf::from("."),
        };
        fs::create_dir_all(parent.as_std_path()).map_err(|err| export_error(&parent, err))?;

        let content = serde_json::to_vec_pretty(&bundle.to_json())
            .map_err(|err| export_error(&path, err))?;
        let mut temp =
            NamedTempFile::new_in(parent.as_std_path()).map_err(|err| export_error(&path, err))?;
        temp.write_all(&content)
            .map_err(|err| export_error(&path, err))?;
        temp.persist(path.as_std_path())
            .map_err(|err| export_error(&path, err.error))?;
        debug!(%path, entries = bundle.len(), "bundle written");
        Ok(())
    }
}

#[derive(Clone)]
pub struct ServerSink {
    client: Client,
    endpoint: Endpoint,
}

impl ServerSink {
    pub fn new(endpoint: Endpoint, trust_all_certificates: bool) -> Result<Self, TransferError> {
        Ok(Self {
            client: http_client(trust_all_certificates)?,
            endpoint,
        })
    }
}

impl BundleSink for ServerSink {
    fn export(&self, bundle: &Bundle) -> Result<(), TransferError> {
        let body = serde_json::to_vec(&bundle.to_json())
            .map_err(|err| TransferError::Export(err.to_string()))?;
        let request = self
            .client
            .post(self.endpoint.url.as_str())
            .header(CONTENT_TYPE, FHIR_JSON)
            .body(body);
        let response = authorize(request, &self.endpoint)
            .send()
            .map_err(|err| TransferError::FhirHttp(err.to_string()))?;
        handle_status(response)?;
        debug!(bundle = %bundle.id(), entries = bundle.len(), "bundle posted");
        Ok(())
    }
}
