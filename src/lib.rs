pub mod bundle;
pub mod client;
pub mod config;
pub mod converters;
pub mod domain;
pub mod error;
pub mod fhir;
pub mod mapping;
pub mod output;
pub mod pipeline;
pub mod profiles;
pub mod provenance;
pub mod sink;
pub mod transfer;
