use std::collections::HashSet;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Endpoint;
use crate::domain::ResourceKind;
use crate::error::TransferError;
use crate::fhir::{array, str_at};

const PAGE_SIZE: &str = "500";
const TIMEOUT: Duration = Duration::from_secs(300);
pub const FHIR_JSON: &str = "application/fhir+json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchFilter {
    Subject(String),
}

impl SearchFilter {
    fn query(&self) -> (&'static str, String) {
        match self {
            SearchFilter::Subject(id) => ("subject", format!("Patient/{id}")),
        }
    }
}

pub trait ResourceFetcher: Send + Sync {
    fn search(
        &self,
        kind: ResourceKind,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<Value>, TransferError>;
    fn read(&self, kind: ResourceKind, id: &str) -> Result<Value, TransferError>;
}

impl<T: ResourceFetcher + ?Sized> ResourceFetcher for &T {
    fn search(
        &self,
        kind: ResourceKind,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<Value>, TransferError> {
        (**self).search(kind, filter)
    }

    fn read(&self, kind: ResourceKind, id: &str) -> Result<Value, TransferError> {
        (**self).read(kind, id)
    }
}

pub(crate) fn http_client(trust_all_certificates: bool) -> Result<Client, TransferError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("transfair/{}", env!("CARGO_PKG_VERSION")))
            .map_err(|err| TransferError::FhirHttp(err.to_string()))?,
    );
    headers.insert(ACCEPT, HeaderValue::from_static(FHIR_JSON));
    Client::builder()
        .default_headers(headers)
        .timeout(TIMEOUT)
        .danger_accept_invalid_certs(trust_all_certificates)
        .build()
        .map_err(|err| TransferError::FhirHttp(err.to_string()))
}

pub(crate) fn authorize(request: RequestBuilder, endpoint: &Endpoint) -> RequestBuilder {
    match endpoint.credentials() {
        Some((username, password)) => request.basic_auth(username, Some(password)),
        None => request,
    }
}

pub(crate) fn handle_status(response: Response) -> Result<Response, TransferError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response
        .text()
        .unwrap_or_else(|_| "FHIR request failed".to_string());
    Err(TransferError::FhirStatus { status, message })
}

#[derive(Clone)]
pub struct FhirHttpClient {
    client: Client,
    endpoint: Endpoint,
}

impl FhirHttpClient {
    pub fn new(endpoint: Endpoint, trust_all_certificates: bool) -> Result<Self, TransferError> {
        Ok(Self {
            client: http_client(trust_all_certificates)?,
            endpoint,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.url.trim_end_matches('/'), path)
    }

    fn get_json(&self, request: RequestBuilder) -> Result<Value, TransferError> {
        let response = authorize(request, &self.endpoint)
            .send()
            .map_err(|err| TransferError::FhirHttp(err.to_string()))?;
        handle_status(response)?
            .json::<Value>()
            .map_err(|err| TransferError::FhirHttp(err.to_string()))
    }
}

impl ResourceFetcher for FhirHttpClient {
    fn search(
        &self,
        kind: ResourceKind,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<Value>, TransferError> {
        let mut request = self.client.get(self.url(kind.as_str()));
        request = match filter {
            Some(filter) => {
                let (key, value) = filter.query();
                request.query(&[(key, value)])
            }
            None => request.query(&[("_count", PAGE_SIZE)]),
        };

        let mut resources = Vec::new();
        let mut visited = HashSet::new();
        let mut page = self.get_json(request)?;
        loop {
            resources.extend(collect_entries(&page));
            let Some(next) = unvisited_next_link(&page, &mut visited) else {
                break;
            };
            debug!(%kind, next = %next, "following search page");
            page = self.get_json(self.client.get(next))?;
        }
        debug!(%kind, count = resources.len(), "search complete");
        Ok(resources)
    }

    fn read(&self, kind: ResourceKind, id: &str) -> Result<Value, TransferError> {
        self.get_json(self.client.get(self.url(&format!("{kind}/{id}"))))
    }
}

fn collect_entries(bundle: &Value) -> impl Iterator<Item = Value> + '_ {
    array(bundle.get("entry")).filter_map(|entry| entry.get("resource").cloned())
}

fn next_link(bundle: &Value) -> Option<String> {
    array(bundle.get("link"))
        .find(|link| str_at(link, &["relation"]) == Some("next"))
        .and_then(|link| str_at(link, &["url"]))
        .map(str::to_string)
}

/// The next page link, or `None` once a link comes back that was already
/// followed.
fn unvisited_next_link(bundle: &Value, visited: &mut HashSet<String>) -> Option<String> {
    let next = next_link(bundle)?;
    if !visited.insert(next.clone()) {
        warn!(next = %next, "search paging repeats a page; stopping");
        return None;
    }
    Some(next)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn reads_entries_and_next_link() {
        let page = json!({
            "resourceType": "Bundle",
            "link": [
                { "relation": "self", "url": "http://fhir/Patient?_count=500" },
                { "relation": "next", "url": "http://fhir/Patient?page=2" }
            ],
            "entry": [
                { "resource": { "resourceType": "Patient", "id": "1" } },
                { "fullUrl": "http://fhir/Patient/2" }
            ]
        });
        assert_eq!(collect_entries(&page).count(), 1);
        assert_eq!(next_link(&page).as_deref(), Some("http://fhir/Patient?page=2"));
    }

    #[test]
    fn last_page_has_no_next_link() {
        let page = json!({ "resourceType": "Bundle", "total": 0 });
        assert_eq!(collect_entries(&page).count(), 0);
        assert_eq!(next_link(&page), None);
    }

    #[test]
    fn repeated_next_link_ends_paging() {
        let page = json!({
            "resourceType": "Bundle",
            "link": [{ "relation": "next", "url": "http://fhir/Patient?page=2" }]
        });
        let mut visited = HashSet::new();
        assert_eq!(
            unvisited_next_link(&page, &mut visited).as_deref(),
            Some("http://fhir/Patient?page=2")
        );
        assert_eq!(unvisited_next_link(&page, &mut visited), None);
    }

    #[test]
    fn subject_filter_query() {
        let filter = SearchFilter::Subject("p-7".to_string());
        assert_eq!(filter.query(), ("subject", "Patient/p-7".to_string()));
    }
}
