//! Integrated channels: exporting course catalogs and learner completions to
//! third-party learning platforms, with an audit row for every attempt.

pub mod audit;
pub mod client;
pub mod configuration;
pub mod export;
pub mod orchestrator;
pub mod repository;
pub mod sap;
pub mod transmit;

#[cfg(test)]
mod tests;

pub use audit::{
    AuditEntry, AuditSummary, CatalogTransmissionAudit, CourseStatus, Grade, LearnerDataRecord,
    LearnerTransmissionAudit, FAILURE_STATUS, NO_CONTENT_STATUS,
};
pub use client::{
    ChannelClient, ChannelClientFactory, ChannelResponse, HttpChannelClients, TransmissionError,
};
pub use configuration::{
    ChannelConfiguration, ChannelCredentials, ChannelKind, SapCredentials, UnknownChannel,
};
pub use orchestrator::{
    ResolutionError, TransmissionOrchestrator, TransmissionReport, TransmissionRequest,
};
pub use repository::{latest_successful_catalog_audit, AuditRepository, ChannelConfigurationRepository};
pub use sap::SuccessFactorsClient;
pub use transmit::{CourseTransmitter, LearnerDataTransmitter, TransmissionState};
