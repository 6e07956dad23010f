use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{PipelineKind, ResourceKind, StartResource};
use crate::error::TransferError;

pub const DEFAULT_CONFIG_FILE: &str = "transfair.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub source: Option<EndpointEntry>,
    #[serde(default)]
    pub target: Option<EndpointEntry>,
    #[serde(default)]
    pub export_path: Option<String>,
    #[serde(default)]
    pub disable_ssl: Option<bool>,
    #[serde(default)]
    pub start_resource: Option<String>,
    #[serde(default)]
    pub resources: Option<Vec<String>>,
    #[serde(default)]
    pub app_version: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum EndpointEntry {
    Shorthand(String),
    Detailed(EndpointEntryObject),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EndpointEntryObject {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl EndpointEntry {
    fn into_object(self) -> EndpointEntryObject {
        match self {
            EndpointEntry::Shorthand(url) => EndpointEntryObject {
                url,
                ..EndpointEntryObject::default()
            },
            EndpointEntry::Detailed(object) => object,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub profile: Option<String>,
    pub source_url: Option<String>,
    pub source_username: Option<String>,
    pub source_password: Option<String>,
    pub target_url: Option<String>,
    pub target_username: Option<String>,
    pub target_password: Option<String>,
    pub export_path: Option<String>,
    pub disable_ssl: Option<bool>,
    pub start_resource: Option<String>,
    pub resources: Option<Vec<String>>,
    pub app_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
        }
    }

    /// Credentials are only used when both parts are non-blank.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let username = self.username.as_deref().map(str::trim)?;
        let password = self.password.as_deref()?;
        if username.is_empty() || password.trim().is_empty() {
            return None;
        }
        Some((username, password))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    File(String),
    Server(Endpoint),
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub pipeline: PipelineKind,
    pub source: Endpoint,
    pub output: OutputTarget,
    pub trust_all_certificates: bool,
    pub start_resource: StartResource,
    pub resources: Vec<ResourceKind>,
    pub app_version: String,
}

impl ResolvedConfig {
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.source.url.trim().is_empty() {
            return Err(TransferError::NotConfigured("source url".to_string()));
        }
        let target_missing = match &self.output {
            OutputTarget::File(prefix) => prefix.trim().is_empty(),
            OutputTarget::Server(endpoint) => endpoint.url.trim().is_empty(),
        };
        if target_missing {
            return Err(TransferError::NotConfigured(
                "target url or export path".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn default_resources() -> Vec<ResourceKind> {
    ResourceKind::patient_scoped().to_vec()
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads the config file. Without an explicit path a missing
    /// `transfair.json` yields an empty config.
    pub fn load(path: Option<&str>) -> Result<Config, TransferError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| TransferError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| TransferError::ConfigParse(err.to_string()))
    }

    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, TransferError> {
        let config = Self::load(path)?;
        Self::resolve_config(config, overrides)
    }

    pub fn resolve_config(
        config: Config,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, TransferError> {
        let pipeline = blank_to_none(overrides.profile.or(config.profile))
            .ok_or_else(|| TransferError::NotConfigured("pipeline profile".to_string()))?
            .parse::<PipelineKind>()?;

        let start_resource = match blank_to_none(overrides.start_resource.or(config.start_resource))
        {
            Some(value) => value.parse()?,
            None => StartResource::default(),
        };

        let resources = match overrides.resources.or(config.resources) {
            Some(values) => {
                let mut resources = Vec::new();
                for value in values.iter().map(|value| value.trim()) {
                    if value.is_empty() {
                        continue;
                    }
                    let kind = value.parse::<ResourceKind>()?;
                    if !resources.contains(&kind) {
                        resources.push(kind);
                    }
                }
                resources
            }
            None => default_resources(),
        };

        let source = config.source.map(EndpointEntry::into_object).unwrap_or_default();
        let source = Endpoint {
            url: overrides.source_url.unwrap_or(source.url),
            username: blank_to_none(overrides.source_username.or(source.username)),
            password: blank_to_none(overrides.source_password.or(source.password)),
        };

        let target = config.target.map(EndpointEntry::into_object).unwrap_or_default();
        let target = Endpoint {
            url: overrides.target_url.unwrap_or(target.url),
            username: blank_to_none(overrides.target_username.or(target.username)),
            password: blank_to_none(overrides.target_password.or(target.password)),
        };

        let output = match blank_to_none(overrides.export_path.or(config.export_path)) {
            Some(prefix) => {
                if !target.url.trim().is_empty() {
                    warn!(target = %target.url, "export path is set; target url is ignored");
                }
                OutputTarget::File(prefix)
            }
            None => OutputTarget::Server(target),
        };

        let resolved = ResolvedConfig {
            pipeline,
            source,
            output,
            trust_all_certificates: overrides.disable_ssl.or(config.disable_ssl).unwrap_or(false),
            start_resource,
            resources,
            app_version: blank_to_none(overrides.app_version.or(config.app_version))
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
        };
        resolved.validate()?;
        Ok(resolved)
    }
}
