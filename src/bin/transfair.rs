use std::process::ExitCode;

use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use transfair::client::FhirHttpClient;
use transfair::config::{ConfigLoader, ConfigOverrides, OutputTarget, ResolvedConfig};
use transfair::error::TransferError;
use transfair::output::{JsonOutput, LogOutput, OutputMode, print_summary};
use transfair::sink::{BundleSink, FileSink, ServerSink};
use transfair::transfer::{ProgressSink, Transfer, TransferReport};

const EXIT_INCOMPLETE: u8 = 4;

#[derive(Parser)]
#[command(name = "transfair")]
#[command(about = "Transfer FHIR resources between the bbmri.de and MII profiles")]
#[command(version)]
struct Cli {
    #[arg(
        long,
        help = "Config file (default: transfair.json in the working directory, if present)",
    )]
    config: Option<String>,

    #[arg(long, env = "TRANSFAIR_PROFILE", help = "BBMRI2MII, MII2BBMRI or BBMRI2BBMRI")]
    profile: Option<String>,

    #[arg(long, env = "SOURCE_URL")]
    source_url: Option<String>,

    #[arg(long, env = "SOURCE_USERNAME")]
    source_username: Option<String>,

    #[arg(long, env = "SOURCE_PASSWORD", hide_env_values = true)]
    source_password: Option<String>,

    #[arg(long, env = "TARGET_URL")]
    target_url: Option<String>,

    #[arg(long, env = "TARGET_USERNAME")]
    target_username: Option<String>,

    #[arg(long, env = "TARGET_PASSWORD", hide_env_values = true)]
    target_password: Option<String>,

    #[arg(
        long,
        env = "EXPORT_PATH",
        help = "Write bundles to `{export_path}{bundle id}.json` instead of a server",
    )]
    export_path: Option<String>,

    #[arg(long, env = "DISABLE_SSL", help = "Accept any TLS certificate from the FHIR servers")]
    disable_ssl: Option<bool>,

    #[arg(long, env = "START_RESOURCE", help = "Patient or Specimen")]
    start_resource: Option<String>,

    #[arg(
        long,
        env = "RESOURCES",
        value_delimiter = ',',
        help = "Comma separated resource kinds to transfer",
    )]
    resources: Option<Vec<String>>,

    #[arg(long, env = "APP_VERSION", help = "Version written into provenance tags")]
    app_version: Option<String>,

    #[arg(long, help = "Print the transfer report as JSON")]
    json: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            profile: self.profile.clone(),
            source_url: self.source_url.clone(),
            source_username: self.source_username.clone(),
            source_password: self.source_password.clone(),
            target_url: self.target_url.clone(),
            target_username: self.target_username.clone(),
            target_password: self.target_password.clone(),
            export_path: self.export_path.clone(),
            disable_ssl: self.disable_ssl,
            start_resource: self.start_resource.clone(),
            resources: self.resources.clone(),
            app_version: self.app_version.clone(),
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(report) if report.has_failures() => ExitCode::from(EXIT_INCOMPLETE),
        Ok(_) => ExitCode::SUCCESS,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(error) = report.downcast_ref::<TransferError>() {
                return ExitCode::from(map_exit_code(error));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &TransferError) -> u8 {
    match error {
        TransferError::NotConfigured(_)
        | TransferError::ConfigRead(_)
        | TransferError::ConfigParse(_)
        | TransferError::InvalidPipeline(_)
        | TransferError::InvalidStartResource(_)
        | TransferError::InvalidResourceKind(_) => 2,
        TransferError::FhirHttp(_) | TransferError::FhirStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<TransferReport> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Log
    };
    let config = ConfigLoader::resolve(cli.config.as_deref(), cli.overrides())?;
    let fetcher = FhirHttpClient::new(config.source.clone(), config.trust_all_certificates)?;

    let report = match &config.output {
        OutputTarget::File(prefix) => transfer(&config, fetcher, FileSink::new(prefix.clone()), mode)?,
        OutputTarget::Server(endpoint) => {
            let sink = ServerSink::new(endpoint.clone(), config.trust_all_certificates)?;
            transfer(&config, fetcher, sink, mode)?
        }
    };

    match mode {
        OutputMode::Json => JsonOutput::print_report(&report).into_diagnostic()?,
        OutputMode::Log => print_summary(&report),
    }
    Ok(report)
}

fn transfer<S: BundleSink>(
    config: &ResolvedConfig,
    fetcher: FhirHttpClient,
    sink: S,
    mode: OutputMode,
) -> Result<TransferReport, TransferError> {
    let progress: &dyn ProgressSink = match mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Log => &LogOutput,
    };
    Transfer::new(config, fetcher, sink).run(progress)
}
