use std::collections::HashMap;
use std::sync::Mutex;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use serde_json::{Value, json};

use transfair::bundle::Bundle;
use transfair::client::{ResourceFetcher, SearchFilter};
use transfair::config::{Endpoint, OutputTarget, ResolvedConfig, default_resources};
use transfair::domain::{PipelineKind, ResourceKind, StartResource, id_part};
use transfair::error::TransferError;
use transfair::profiles::{
    BBMRI_BIOBANK, BBMRI_COLLECTION, BBMRI_PATIENT, ICD_10_WHO, MII_ORGANIZATION, MII_PATIENT,
    SNOMED,
};
use transfair::provenance::ProvenanceTag;
use transfair::sink::BundleSink;
use transfair::transfer::{ProgressEvent, ProgressSink, Transfer, TransferPhase};

#[derive(Default)]
struct MockFetcher {
    resources: HashMap<ResourceKind, Vec<Value>>,
    failing: Option<ResourceKind>,
    calls: Mutex<usize>,
}

impl MockFetcher {
    fn with(mut self, kind: ResourceKind, resource: Value) -> Self {
        self.resources.entry(kind).or_default().push(resource);
        self
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl ResourceFetcher for MockFetcher {
    fn search(
        &self,
        kind: ResourceKind,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<Value>, TransferError> {
        *self.calls.lock().unwrap() += 1;
        if self.failing == Some(kind) {
            return Err(TransferError::FhirHttp("connection reset".to_string()));
        }
        let all = self.resources.get(&kind).cloned().unwrap_or_default();
        Ok(match filter {
            None => all,
            Some(SearchFilter::Subject(id)) => all
                .into_iter()
                .filter(|resource| {
                    resource["subject"]["reference"]
                        .as_str()
                        .map(|subject| id_part(subject) == id.as_str())
                        .unwrap_or(false)
                })
                .collect(),
        })
    }

    fn read(&self, kind: ResourceKind, id: &str) -> Result<Value, TransferError> {
        *self.calls.lock().unwrap() += 1;
        self.resources
            .get(&kind)
            .and_then(|all| all.iter().find(|resource| resource["id"] == id))
            .cloned()
            .ok_or(TransferError::FhirStatus {
                status: 404,
                message: format!("{kind}/{id} not found"),
            })
    }
}

#[derive(Default)]
struct MockSink {
    bundles: Mutex<Vec<Value>>,
    reject_patient: Option<String>,
}

impl MockSink {
    fn bundles(&self) -> Vec<Value> {
        self.bundles.lock().unwrap().clone()
    }
}

impl BundleSink for MockSink {
    fn export(&self, bundle: &Bundle) -> Result<(), TransferError> {
        let rejected = self.reject_patient.as_deref().is_some_and(|id| {
            bundle
                .resources()
                .any(|resource| resource["resourceType"] == "Patient" && resource["id"] == id)
        });
        if rejected {
            return Err(TransferError::Export("disk full".to_string()));
        }
        self.bundles.lock().unwrap().push(bundle.to_json());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressSink for RecordingProgress {
    fn event(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn config(pipeline: PipelineKind) -> ResolvedConfig {
    ResolvedConfig {
        pipeline,
        source: Endpoint::new("http://source/fhir"),
        output: OutputTarget::Server(Endpoint::new("http://target/fhir")),
        trust_all_certificates: false,
        start_resource: StartResource::Patient,
        resources: default_resources(),
        app_version: "1.0.0".to_string(),
    }
}

fn tag(pipeline: PipelineKind) -> ProvenanceTag {
    let date = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
    ProvenanceTag::on_date("1.0.0", pipeline.as_str(), date)
}

fn bbmri_patient(id: &str, gender: &str) -> Value {
    json!({
        "resourceType": "Patient",
        "id": id,
        "meta": { "profile": [BBMRI_PATIENT] },
        "gender": gender,
        "birthDate": "1970-01-01"
    })
}

fn resources(bundle: &Value) -> Vec<&Value> {
    bundle["entry"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| &entry["resource"])
        .collect()
}

#[test]
fn patient_without_other_resources_still_gets_a_bundle() {
    let config = config(PipelineKind::Bbmri2Mii);
    let fetcher = MockFetcher::default().with(ResourceKind::Patient, bbmri_patient("p-1", "female"));
    let transfer =
        Transfer::new(&config, fetcher, MockSink::default()).with_tag(tag(PipelineKind::Bbmri2Mii));
    let progress = RecordingProgress::default();

    let report = transfer.run(&progress).unwrap();

    assert_eq!(report.total, 1);
    assert_eq!(report.exported, vec!["p-1".to_string()]);
    let bundles = transfer.sink().bundles();
    assert_eq!(bundles.len(), 1);
    let entries = resources(&bundles[0]);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["meta"]["profile"][0], MII_PATIENT);
    assert_eq!(entries[0]["id"], "p-1");
    assert_eq!(
        entries[0]["meta"]["tag"][0]["code"],
        "TransFAIR 1.0.0 - 2024-05-06 - BBMRI2MII"
    );
    assert_eq!(bundles[0]["entry"][0]["request"]["url"], "Patient/p-1");

    let events = progress.events.lock().unwrap();
    assert_eq!(events.first(), Some(&ProgressEvent::Phase(TransferPhase::Idle)));
    assert_eq!(events.last(), Some(&ProgressEvent::Phase(TransferPhase::Done)));
    assert!(events.contains(&ProgressEvent::PatientExported {
        id: "p-1".to_string(),
        exported: 1,
        total: 1,
    }));
}

#[test]
fn mapping_error_skips_only_that_patient() {
    let config = config(PipelineKind::Bbmri2Mii);
    let fetcher = MockFetcher::default()
        .with(ResourceKind::Patient, bbmri_patient("p-1", "robot"))
        .with(ResourceKind::Patient, bbmri_patient("p-2", "male"));
    let transfer = Transfer::new(&config, fetcher, MockSink::default());
    let progress = RecordingProgress::default();

    let report = transfer.run(&progress).unwrap();

    assert_eq!(report.exported, vec!["p-2".to_string()]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].id, "p-1");
    assert!(report.skipped[0].reason.contains("robot"));
    assert!(!report.has_failures());
    assert_eq!(transfer.sink().bundles().len(), 1);
    assert!(progress.events.lock().unwrap().iter().any(|event| matches!(
        event,
        ProgressEvent::PatientSkipped { id, .. } if id == "p-1"
    )));
}

#[test]
fn export_failure_is_not_counted_as_exported() {
    let config = config(PipelineKind::Bbmri2Mii);
    let fetcher = MockFetcher::default()
        .with(ResourceKind::Patient, bbmri_patient("p-1", "male"))
        .with(ResourceKind::Patient, bbmri_patient("p-2", "female"));
    let sink = MockSink {
        reject_patient: Some("p-1".to_string()),
        ..MockSink::default()
    };
    let transfer = Transfer::new(&config, fetcher, sink);
    let progress = RecordingProgress::default();

    let report = transfer.run(&progress).unwrap();

    assert_eq!(report.exported, vec!["p-2".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id, "p-1");
    assert!(report.has_failures());
    assert!(progress.events.lock().unwrap().iter().any(|event| matches!(
        event,
        ProgressEvent::ExportFailed { id, .. } if id == "p-1"
    )));
}

#[test]
fn missing_source_is_reported_before_any_fetch() {
    let mut config = config(PipelineKind::Mii2Bbmri);
    config.source = Endpoint::new("  ");
    let fetcher = MockFetcher::default().with(ResourceKind::Patient, bbmri_patient("p-1", "male"));
    let sink = MockSink::default();
    let transfer = Transfer::new(&config, &fetcher, &sink);

    let result = transfer.run(&RecordingProgress::default());

    assert_matches!(result, Err(TransferError::NotConfigured(what)) if what == "source url");
    assert_eq!(fetcher.calls(), 0);
    assert_eq!(sink.bundles().len(), 0);
}

#[test]
fn fetch_error_aborts_the_run() {
    let config = config(PipelineKind::Bbmri2Mii);
    let fetcher = MockFetcher {
        failing: Some(ResourceKind::Condition),
        ..MockFetcher::default()
    }
    .with(ResourceKind::Patient, bbmri_patient("p-1", "male"));
    let transfer = Transfer::new(&config, fetcher, MockSink::default());

    let result = transfer.run(&RecordingProgress::default());

    assert_matches!(result, Err(TransferError::FhirHttp(_)));
}

#[test]
fn specimen_start_resource_yields_sorted_distinct_patients() {
    let mut config = config(PipelineKind::Bbmri2Bbmri);
    config.start_resource = StartResource::Specimen;
    let fetcher = MockFetcher::default()
        .with(
            ResourceKind::Specimen,
            json!({ "resourceType": "Specimen", "id": "s-1", "subject": { "reference": "Patient/b" } }),
        )
        .with(
            ResourceKind::Specimen,
            json!({ "resourceType": "Specimen", "id": "s-2", "subject": { "reference": "Patient/a" } }),
        )
        .with(
            ResourceKind::Specimen,
            json!({
                "resourceType": "Specimen",
                "id": "s-3",
                "subject": { "reference": "http://source/fhir/Patient/a/_history/3" }
            }),
        );
    let transfer = Transfer::new(&config, fetcher, MockSink::default());

    let ids: Vec<String> = transfer.patient_ids().unwrap().into_iter().collect();

    assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn mii_cause_of_death_becomes_bbmri_observation() {
    let mut config = config(PipelineKind::Mii2Bbmri);
    config.resources = vec![ResourceKind::Patient, ResourceKind::Condition];
    let fetcher = MockFetcher::default()
        .with(
            ResourceKind::Patient,
            json!({ "resourceType": "Patient", "id": "p-1", "deceasedBoolean": true }),
        )
        .with(
            ResourceKind::Condition,
            json!({
                "resourceType": "Condition",
                "id": "cod-1",
                "subject": { "reference": "Patient/p-1" },
                "category": [{ "coding": [{ "system": SNOMED, "code": "16100001" }] }],
                "code": { "coding": [{ "system": ICD_10_WHO, "code": "C34.9" }] }
            }),
        );
    let transfer = Transfer::new(&config, fetcher, MockSink::default());

    transfer.run(&RecordingProgress::default()).unwrap();

    let bundles = transfer.sink().bundles();
    let entries = resources(&bundles[0]);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["deceasedBoolean"], true);
    assert_eq!(entries[1]["resourceType"], "Observation");
    assert_eq!(entries[1]["valueCodeableConcept"]["coding"][0]["code"], "C34.9");
}

#[test]
fn derived_specimen_is_left_out_of_bbmri_bundle() {
    let mut config = config(PipelineKind::Mii2Bbmri);
    config.resources = vec![ResourceKind::Patient, ResourceKind::Specimen];
    let specimen = |id: &str, parent: Option<&str>| {
        let mut specimen = json!({
            "resourceType": "Specimen",
            "id": id,
            "subject": { "reference": "Patient/p-1" },
            "type": { "coding": [{ "system": SNOMED, "code": "119297000" }] }
        });
        if let Some(parent) = parent {
            specimen["parent"] = json!([{ "reference": parent }]);
        }
        specimen
    };
    let fetcher = MockFetcher::default()
        .with(ResourceKind::Patient, json!({ "resourceType": "Patient", "id": "p-1" }))
        .with(ResourceKind::Specimen, specimen("s-1", None))
        .with(ResourceKind::Specimen, specimen("s-2", Some("Specimen/s-1")));
    let transfer = Transfer::new(&config, fetcher, MockSink::default());

    transfer.run(&RecordingProgress::default()).unwrap();

    let bundles = transfer.sink().bundles();
    let entries = resources(&bundles[0]);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1]["id"], "s-1");
    assert_eq!(entries[1]["type"]["coding"][0]["code"], "whole-blood");
}

#[test]
fn organizations_are_exported_first_in_their_own_bundle() {
    let mut config = config(PipelineKind::Bbmri2Mii);
    config.resources.push(ResourceKind::Organization);
    let fetcher = MockFetcher::default()
        .with(ResourceKind::Patient, bbmri_patient("p-1", "male"))
        .with(
            ResourceKind::Organization,
            json!({ "resourceType": "Organization", "id": "bb-1", "meta": { "profile": [BBMRI_BIOBANK] } }),
        )
        .with(
            ResourceKind::Organization,
            json!({
                "resourceType": "Organization",
                "id": "col-1",
                "meta": { "profile": [BBMRI_COLLECTION] },
                "partOf": { "reference": "Organization/bb-1" }
            }),
        )
        .with(
            ResourceKind::Organization,
            json!({ "resourceType": "Organization", "id": "hospital" }),
        );
    let transfer = Transfer::new(&config, fetcher, MockSink::default());

    let report = transfer.run(&RecordingProgress::default()).unwrap();

    assert_eq!(report.organizations, 2);
    let bundles = transfer.sink().bundles();
    assert_eq!(bundles.len(), 2);
    let organizations = resources(&bundles[0]);
    assert_eq!(organizations.len(), 2);
    assert!(
        organizations
            .iter()
            .all(|organization| organization["meta"]["profile"][0] == MII_ORGANIZATION)
    );
    assert_eq!(organizations[1]["partOf"]["reference"], "Organization/bb-1");
}

#[test]
fn passthrough_tags_a_copy() {
    let config = config(PipelineKind::Bbmri2Bbmri);
    let patient = bbmri_patient("p-1", "other");
    let fetcher = MockFetcher::default().with(ResourceKind::Patient, patient.clone());
    let transfer = Transfer::new(&config, fetcher, MockSink::default())
        .with_tag(tag(PipelineKind::Bbmri2Bbmri));

    transfer.run(&RecordingProgress::default()).unwrap();

    let bundles = transfer.sink().bundles();
    let entries = resources(&bundles[0]);
    assert_eq!(entries[0]["gender"], "other");
    assert_eq!(entries[0]["meta"]["profile"][0], BBMRI_PATIENT);
    assert_eq!(
        entries[0]["meta"]["tag"][0]["code"],
        "TransFAIR 1.0.0 - 2024-05-06 - BBMRI2BBMRI"
    );
    assert!(patient["meta"].get("tag").is_none());
}

#[test]
fn passthrough_copies_organizations_with_default_resources() {
    let config = config(PipelineKind::Bbmri2Bbmri);
    let fetcher = MockFetcher::default()
        .with(ResourceKind::Patient, bbmri_patient("p-1", "male"))
        .with(
            ResourceKind::Organization,
            json!({ "resourceType": "Organization", "id": "bb-1", "meta": { "profile": [BBMRI_BIOBANK] } }),
        )
        .with(
            ResourceKind::OrganizationAffiliation,
            json!({
                "resourceType": "OrganizationAffiliation",
                "id": "aff-1",
                "organization": { "reference": "Organization/bb-1" }
            }),
        );
    let transfer = Transfer::new(&config, fetcher, MockSink::default());

    let report = transfer.run(&RecordingProgress::default()).unwrap();

    assert_eq!(report.organizations, 2);
    let bundles = transfer.sink().bundles();
    assert_eq!(bundles.len(), 2);
    let organizations = resources(&bundles[0]);
    assert_eq!(organizations[0]["id"], "bb-1");
    assert_eq!(organizations[1]["resourceType"], "OrganizationAffiliation");
}

#[test]
fn converting_pipeline_skips_organizations_unless_listed() {
    let config = config(PipelineKind::Bbmri2Mii);
    let fetcher = MockFetcher::default()
        .with(ResourceKind::Patient, bbmri_patient("p-1", "male"))
        .with(
            ResourceKind::Organization,
            json!({ "resourceType": "Organization", "id": "bb-1", "meta": { "profile": [BBMRI_BIOBANK] } }),
        );
    let transfer = Transfer::new(&config, fetcher, MockSink::default());

    let report = transfer.run(&RecordingProgress::default()).unwrap();

    assert_eq!(report.organizations, 0);
    assert_eq!(transfer.sink().bundles().len(), 1);
}

#[test]
fn missing_patient_is_skipped_and_the_run_continues() {
    let mut config = config(PipelineKind::Bbmri2Mii);
    config.start_resource = StartResource::Specimen;
    let fetcher = MockFetcher::default()
        .with(ResourceKind::Patient, bbmri_patient("p-2", "female"))
        .with(
            ResourceKind::Specimen,
            json!({ "resourceType": "Specimen", "id": "s-1", "subject": { "reference": "Patient/p-1" } }),
        )
        .with(
            ResourceKind::Specimen,
            json!({ "resourceType": "Specimen", "id": "s-2", "subject": { "reference": "Patient/p-2" } }),
        );
    let transfer = Transfer::new(&config, fetcher, MockSink::default());
    let progress = RecordingProgress::default();

    let report = transfer.run(&progress).unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.exported, vec!["p-2".to_string()]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].id, "p-1");
    assert!(!report.has_failures());
    assert_eq!(transfer.sink().bundles().len(), 1);
    assert!(progress.events.lock().unwrap().iter().any(|event| matches!(
        event,
        ProgressEvent::PatientSkipped { id, .. } if id == "p-1"
    )));
}
