use std::io::{self, Write};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::transfer::{ProgressEvent, ProgressSink, TransferReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Log,
    Json,
}

pub struct LogOutput;

impl ProgressSink for LogOutput {
    fn event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Phase(phase) => debug!(?phase, "phase"),
            ProgressEvent::PatientsDiscovered { total } => info!(total, "patients discovered"),
            ProgressEvent::OrganizationsExported { count } => {
                info!(count, "organizations exported")
            }
            ProgressEvent::PatientSkipped { id, reason } => {
                warn!(patient = %id, %reason, "patient skipped")
            }
            ProgressEvent::PatientExported {
                id,
                exported,
                total,
            } => info!(patient = %id, "exported {exported}/{total}"),
            ProgressEvent::ExportFailed { id, reason } => {
                warn!(scope = %id, %reason, "export failed")
            }
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &TransferReport) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub fn print_summary(report: &TransferReport) {
    println!(
        "{}: {}/{} patients exported, {} skipped, {} failed, {} organizations",
        report.pipeline,
        report.exported.len(),
        report.total,
        report.skipped.len(),
        report.failed.len(),
        report.organizations
    );
    for outcome in &report.failed {
        println!("  failed {}: {}", outcome.id, outcome.reason);
    }
}
