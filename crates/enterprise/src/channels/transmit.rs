use chrono::Utc;
use tracing::{error, info};

use super::audit::{
    AuditSummary, CatalogTransmissionAudit, LearnerDataRecord, LearnerTransmissionAudit,
    FAILURE_STATUS, NO_CONTENT_STATUS,
};
use super::client::{ChannelClient, TransmissionError};
use super::configuration::ChannelConfiguration;
use super::export::CourseExporter;
use super::repository::{latest_successful_catalog_audit, AuditRepository};
use crate::catalog::CatalogError;
use crate::store::RepositoryError;

/// Lifecycle of one transmission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmissionState {
    NotStarted,
    Sending,
    Succeeded,
    Failed,
    Suppressed,
}

/// Sends a customer's catalog to one channel configuration.
pub struct CourseTransmitter<'a> {
    configuration: &'a ChannelConfiguration,
    client: &'a dyn ChannelClient,
    audits: &'a dyn AuditRepository,
    state: TransmissionState,
}

impl<'a> CourseTransmitter<'a> {
    pub fn new(
        configuration: &'a ChannelConfiguration,
        client: &'a dyn ChannelClient,
        audits: &'a dyn AuditRepository,
    ) -> Self {
        Self {
            configuration,
            client,
            audits,
            state: TransmissionState::NotStarted,
        }
    }

    pub fn state(&self) -> TransmissionState {
        self.state
    }

    /// Send every block and persist exactly one audit. Channel failures are
    /// recorded in the audit; only storage failures are returned.
    pub fn transmit(
        &mut self,
        exporter: &mut CourseExporter<'_>,
    ) -> Result<CatalogTransmissionAudit, RepositoryError> {
        let previous = latest_successful_catalog_audit(
            self.audits,
            &self.configuration.enterprise_customer_uuid,
        )?
        .map(|audit| audit.audit_summary)
        .unwrap_or_default();
        exporter.resolve_removed_courses(&previous);

        self.state = TransmissionState::Sending;
        let mut total_courses = 0;
        let outcome = match exporter.get_serialized_data_blocks() {
            Ok(blocks) => {
                total_courses = blocks.iter().map(|block| block.item_count).sum();
                self.send_blocks(blocks.iter().map(|block| block.payload.as_str()))
            }
            Err(err) => Err(TransmissionError::Malformed(err.to_string())),
        };

        self.finish(outcome, total_courses, exporter.audit_summary())
    }

    /// Persist a failed audit for a catalog that could not be exported.
    pub fn record_export_failure(
        &mut self,
        error: &CatalogError,
    ) -> Result<CatalogTransmissionAudit, RepositoryError> {
        self.state = TransmissionState::Sending;
        self.finish(
            Err(TransmissionError::Request(error.to_string())),
            0,
            AuditSummary::new(),
        )
    }

    fn finish(
        &mut self,
        outcome: Result<String, TransmissionError>,
        total_courses: usize,
        audit_summary: AuditSummary,
    ) -> Result<CatalogTransmissionAudit, RepositoryError> {
        let (status, error_message) = match outcome {
            Ok(status) => {
                self.state = TransmissionState::Succeeded;
                info!(
                    configuration = %self.configuration,
                    channel = self.configuration.channel_code(),
                    status = %status,
                    total_courses,
                    "transmission of course metadata succeeded"
                );
                (status, String::new())
            }
            Err(err) => {
                self.state = TransmissionState::Failed;
                error!(
                    configuration = %self.configuration,
                    channel = self.configuration.channel_code(),
                    error = %err,
                    "transmission of course metadata failed"
                );
                (FAILURE_STATUS.to_string(), err.to_string())
            }
        };

        self.audits.record_catalog_audit(CatalogTransmissionAudit {
            channel_configuration_id: self.configuration.id,
            enterprise_customer_uuid: self.configuration.enterprise_customer_uuid,
            total_courses,
            status,
            error_message,
            audit_summary,
            created: Utc::now(),
        })
    }

    // Stops at the first failed block; the returned status is the last one
    // the channel answered with, or NO_CONTENT_STATUS when nothing was sent.
    fn send_blocks<'p>(
        &self,
        payloads: impl Iterator<Item = &'p str>,
    ) -> Result<String, TransmissionError> {
        let mut status = NO_CONTENT_STATUS.to_string();
        for payload in payloads {
            info!(configuration = %self.configuration, "sending course import");
            let response = self.client.send_course_import(payload)?;
            status = response.status.to_string();
        }
        Ok(status)
    }
}

/// Sends learner completion records to one channel configuration.
pub struct LearnerDataTransmitter<'a> {
    configuration: &'a ChannelConfiguration,
    client: &'a dyn ChannelClient,
    audits: &'a dyn AuditRepository,
    state: TransmissionState,
}

impl<'a> LearnerDataTransmitter<'a> {
    pub fn new(
        configuration: &'a ChannelConfiguration,
        client: &'a dyn ChannelClient,
        audits: &'a dyn AuditRepository,
    ) -> Self {
        Self {
            configuration,
            client,
            audits,
            state: TransmissionState::NotStarted,
        }
    }

    pub fn state(&self) -> TransmissionState {
        self.state
    }

    /// Send one record. Returns `None` without contacting the channel when a
    /// completed, successful send already exists for the enrollment.
    pub fn transmit(
        &mut self,
        record: LearnerDataRecord,
    ) -> Result<Option<LearnerTransmissionAudit>, RepositoryError> {
        let enrollment_id = record.enterprise_course_enrollment_id;
        let already_sent = self
            .audits
            .learner_audits(enrollment_id)?
            .iter()
            .any(LearnerTransmissionAudit::suppresses_resend);
        if already_sent {
            self.state = TransmissionState::Suppressed;
            info!(enrollment_id, "learner data already transmitted; skipping");
            return Ok(None);
        }

        self.state = TransmissionState::Sending;
        let outcome = record
            .to_payload()
            .map_err(|err| TransmissionError::Malformed(err.to_string()))
            .and_then(|payload| {
                info!(
                    configuration = %self.configuration,
                    enrollment_id,
                    payload = %payload,
                    "sending learner completion"
                );
                self.client
                    .send_completion_status(&record.external_user_id, &payload)
            });

        let (status, error_message) = match outcome {
            Ok(response) => {
                self.state = TransmissionState::Succeeded;
                info!(
                    configuration = %self.configuration,
                    enrollment_id,
                    status = response.status,
                    completed = record.course_completed,
                    "transmission of learner data succeeded"
                );
                (response.status.to_string(), String::new())
            }
            Err(err) => {
                self.state = TransmissionState::Failed;
                error!(
                    configuration = %self.configuration,
                    enrollment_id,
                    error = %err,
                    "transmission of learner data failed"
                );
                (FAILURE_STATUS.to_string(), err.to_string())
            }
        };

        let audit = self.audits.record_learner_audit(LearnerTransmissionAudit {
            record,
            status,
            error_message,
            created: Utc::now(),
        })?;
        Ok(Some(audit))
    }
}
