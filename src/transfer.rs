use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::bundle::Bundle;
use crate::client::{ResourceFetcher, SearchFilter};
use crate::config::ResolvedConfig;
use crate::domain::{PipelineKind, ResourceKind, StartResource, id_part};
use crate::error::TransferError;
use crate::fhir::{reference_of, str_at};
use crate::pipeline::{Pipeline, pipeline_for};
use crate::provenance::ProvenanceTag;
use crate::sink::BundleSink;

pub const ORGANIZATIONS: &str = "organizations";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransferPhase {
    Idle,
    SetupValidated,
    Iterating,
    Exporting,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Phase(TransferPhase),
    PatientsDiscovered { total: usize },
    OrganizationsExported { count: usize },
    PatientSkipped { id: String, reason: String },
    PatientExported { id: String, exported: usize, total: usize },
    ExportFailed { id: String, reason: String },
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferReport {
    pub pipeline: PipelineKind,
    pub total: usize,
    pub exported: Vec<String>,
    pub skipped: Vec<Outcome>,
    pub failed: Vec<Outcome>,
    pub organizations: usize,
}

impl TransferReport {
    fn new(pipeline: PipelineKind) -> Self {
        Self {
            pipeline,
            total: 0,
            exported: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            organizations: 0,
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

pub struct Transfer<'a, F: ResourceFetcher, S: BundleSink> {
    config: &'a ResolvedConfig,
    fetcher: F,
    sink: S,
    pipeline: Box<dyn Pipeline>,
    tag: ProvenanceTag,
}

impl<'a, F: ResourceFetcher, S: BundleSink> Transfer<'a, F, S> {
    pub fn new(config: &'a ResolvedConfig, fetcher: F, sink: S) -> Self {
        let tag = ProvenanceTag::new(&config.app_version, config.pipeline.as_str());
        Self {
            config,
            fetcher,
            sink,
            pipeline: pipeline_for(config.pipeline),
            tag,
        }
    }

    pub fn with_tag(mut self, tag: ProvenanceTag) -> Self {
        self.tag = tag;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Runs the whole transfer.
    ///
    /// Fetch errors abort the run, except a patient missing on the source,
    /// which is skipped like one whose resources fail to convert. A failed
    /// export is recorded and the run goes on.
    pub fn run(&self, progress: &dyn ProgressSink) -> Result<TransferReport, TransferError> {
        progress.event(ProgressEvent::Phase(TransferPhase::Idle));
        self.config.validate()?;
        progress.event(ProgressEvent::Phase(TransferPhase::SetupValidated));

        let mut report = TransferReport::new(self.pipeline.kind());
        if self.pipeline.transfers_organizations_by_default()
            || self.config.resources.contains(&ResourceKind::Organization)
        {
            self.transfer_organizations(&mut report, progress)?;
        }

        let patient_ids = self.patient_ids()?;
        report.total = patient_ids.len();
        progress.event(ProgressEvent::PatientsDiscovered {
            total: report.total,
        });
        info!(pipeline = %self.pipeline.kind(), total = report.total, "starting patient transfer");

        for id in &patient_ids {
            progress.event(ProgressEvent::Phase(TransferPhase::Iterating));
            let Some(resources) = self.fetch_patient(id)? else {
                warn!(patient = %id, "patient not found on source");
                self.skip(&mut report, progress, id, "patient not found".to_string());
                continue;
            };
            let bundle = match self.convert_patient(&resources) {
                Ok(bundle) => bundle,
                Err(err) => {
                    warn!(patient = %id, error = %err, "patient skipped");
                    self.skip(&mut report, progress, id, err.to_string());
                    continue;
                }
            };
            if bundle.is_empty() {
                self.skip(&mut report, progress, id, "nothing to export".to_string());
                continue;
            }

            progress.event(ProgressEvent::Phase(TransferPhase::Exporting));
            match self.sink.export(&bundle) {
                Ok(()) => {
                    report.exported.push(id.clone());
                    progress.event(ProgressEvent::PatientExported {
                        id: id.clone(),
                        exported: report.exported.len(),
                        total: report.total,
                    });
                }
                Err(err) => {
                    warn!(patient = %id, error = %err, "export failed");
                    report.failed.push(Outcome {
                        id: id.clone(),
                        reason: err.to_string(),
                    });
                    progress.event(ProgressEvent::ExportFailed {
                        id: id.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        progress.event(ProgressEvent::Phase(TransferPhase::Done));
        info!(
            exported = report.exported.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "transfer finished"
        );
        Ok(report)
    }

    fn skip(
        &self,
        report: &mut TransferReport,
        progress: &dyn ProgressSink,
        id: &str,
        reason: String,
    ) {
        report.skipped.push(Outcome {
            id: id.to_string(),
            reason: reason.clone(),
        });
        progress.event(ProgressEvent::PatientSkipped {
            id: id.to_string(),
            reason,
        });
    }

    pub fn patient_ids(&self) -> Result<BTreeSet<String>, TransferError> {
        let ids = match self.config.start_resource {
            StartResource::Patient => self
                .fetcher
                .search(ResourceKind::Patient, None)?
                .iter()
                .filter_map(|patient| str_at(patient, &["id"]))
                .map(|id| id_part(id).to_string())
                .filter(|id| !id.is_empty())
                .collect(),
            StartResource::Specimen => self
                .fetcher
                .search(ResourceKind::Specimen, None)?
                .iter()
                .filter_map(|specimen| reference_of(specimen.get("subject")))
                .map(|subject| id_part(subject).to_string())
                .filter(|id| !id.is_empty())
                .collect(),
        };
        Ok(ids)
    }

    /// `None` when the source has no Patient with this id.
    fn fetch_patient(
        &self,
        id: &str,
    ) -> Result<Option<Vec<(ResourceKind, Value)>>, TransferError> {
        let filter = SearchFilter::Subject(id.to_string());
        let mut resources = Vec::new();
        for kind in &self.config.resources {
            match kind {
                ResourceKind::Patient => match self.fetcher.read(ResourceKind::Patient, id) {
                    Ok(patient) => resources.push((*kind, patient)),
                    Err(TransferError::FhirStatus { status: 404, .. }) => return Ok(None),
                    Err(err) => return Err(err),
                },
                ResourceKind::Condition | ResourceKind::Specimen | ResourceKind::Observation => {
                    let found = self.fetcher.search(*kind, Some(&filter))?;
                    debug!(patient = %id, kind = %kind, count = found.len(), "fetched");
                    resources.extend(found.into_iter().map(|resource| (*kind, resource)));
                }
                ResourceKind::Organization | ResourceKind::OrganizationAffiliation => {}
            }
        }
        Ok(Some(resources))
    }

    fn convert_patient(&self, resources: &[(ResourceKind, Value)]) -> Result<Bundle, TransferError> {
        let mut bundle = Bundle::new();
        for (kind, resource) in resources {
            if let Some(converted) = self.pipeline.convert(*kind, resource)? {
                bundle.push(self.tag.apply(converted));
            }
        }
        Ok(bundle)
    }

    fn transfer_organizations(
        &self,
        report: &mut TransferReport,
        progress: &dyn ProgressSink,
    ) -> Result<(), TransferError> {
        let mut bundle = Bundle::new();
        for kind in self.pipeline.organization_kinds() {
            for resource in self.fetcher.search(*kind, None)? {
                match self.pipeline.convert(*kind, &resource) {
                    Ok(Some(converted)) => bundle.push(self.tag.apply(converted)),
                    Ok(None) => {}
                    Err(err) => {
                        warn!(kind = %kind, id = ?str_at(&resource, &["id"]), error = %err, "organization skipped");
                    }
                }
            }
        }
        if bundle.is_empty() {
            debug!("no organizations to export");
            return Ok(());
        }

        match self.sink.export(&bundle) {
            Ok(()) => {
                report.organizations = bundle.len();
                progress.event(ProgressEvent::OrganizationsExported {
                    count: bundle.len(),
                });
            }
            Err(err) => {
                warn!(error = %err, "organization export failed");
                report.failed.push(Outcome {
                    id: ORGANIZATIONS.to_string(),
                    reason: err.to_string(),
                });
                progress.event(ProgressEvent::ExportFailed {
                    id: ORGANIZATIONS.to_string(),
                    reason: err.to_string(),
                });
            }
        }
        Ok(())
    }
}
