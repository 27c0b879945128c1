use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use super::client::ChannelClientFactory;
use super::configuration::{ChannelConfiguration, ChannelKind, UnknownChannel};
use super::export::{CourseExporter, LearnerExporter, LearnerProgressSource};
use super::repository::{AuditRepository, ChannelConfigurationRepository};
use super::transmit::{CourseTransmitter, LearnerDataTransmitter};
use crate::catalog::CatalogService;
use crate::config::ChannelSettings;
use crate::consent::ConsentPolicyEngine;
use crate::enterprise::{EnterpriseCustomer, EnterpriseDirectory};
use crate::store::RepositoryError;

/// Arguments shared by both transmission commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransmissionRequest {
    pub acting_user: String,
    pub enterprise_customer: Option<String>,
    pub channel: Option<String>,
}

impl TransmissionRequest {
    pub fn new(acting_user: impl Into<String>) -> Self {
        Self {
            acting_user: acting_user.into(),
            ..Self::default()
        }
    }

    pub fn for_customer(mut self, uuid: impl Into<String>) -> Self {
        self.enterprise_customer = Some(uuid.into());
        self
    }

    pub fn on_channel(mut self, code: impl Into<String>) -> Self {
        self.channel = Some(code.into());
        self
    }
}

/// Invalid command input. Aborts the run before any item is processed.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("A user with the username {0} was not found.")]
    UnknownUser(String),
    #[error("Enterprise customer {0} not found, or not active")]
    UnknownCustomer(String),
    #[error(transparent)]
    InvalidChannel(#[from] UnknownChannel),
    #[error("Enterprise customer {0} has no active integrated channel")]
    NoActiveChannel(Uuid),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Counts for one command run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransmissionReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub suppressed: usize,
    pub skipped: usize,
}

impl TransmissionReport {
    fn record(&mut self, succeeded: bool) {
        self.processed += 1;
        if succeeded {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn log_summary(&self, command: &str) {
        info!(
            command,
            processed = self.processed,
            succeeded = self.succeeded,
            failed = self.failed,
            suppressed = self.suppressed,
            skipped = self.skipped,
            "transmission run finished"
        );
    }
}

struct Target {
    configuration: ChannelConfiguration,
    customer: EnterpriseCustomer,
}

/// Drives the transmission commands across every matching channel
/// configuration, one at a time, isolating per-configuration failures.
pub struct TransmissionOrchestrator {
    directory: Arc<dyn EnterpriseDirectory>,
    configurations: Arc<dyn ChannelConfigurationRepository>,
    audits: Arc<dyn AuditRepository>,
    catalog: Arc<dyn CatalogService>,
    consent: ConsentPolicyEngine,
    clients: Arc<dyn ChannelClientFactory>,
    settings: ChannelSettings,
}

impl TransmissionOrchestrator {
    pub fn new(
        directory: Arc<dyn EnterpriseDirectory>,
        configurations: Arc<dyn ChannelConfigurationRepository>,
        audits: Arc<dyn AuditRepository>,
        catalog: Arc<dyn CatalogService>,
        consent: ConsentPolicyEngine,
        clients: Arc<dyn ChannelClientFactory>,
        settings: ChannelSettings,
    ) -> Self {
        Self {
            directory,
            configurations,
            audits,
            catalog,
            consent,
            clients,
            settings,
        }
    }

    fn resolve(&self, request: &TransmissionRequest) -> Result<(Option<EnterpriseCustomer>, Vec<ChannelKind>), ResolutionError> {
        if self.directory.user(&request.acting_user)?.is_none() {
            return Err(ResolutionError::UnknownUser(request.acting_user.clone()));
        }

        let customer = match request.enterprise_customer.as_deref() {
            Some(raw) => {
                let uuid = Uuid::parse_str(raw.trim())
                    .map_err(|_| ResolutionError::UnknownCustomer(raw.to_string()))?;
                let customer = self
                    .directory
                    .active_customer(&uuid)?
                    .ok_or_else(|| ResolutionError::UnknownCustomer(raw.to_string()))?;
                Some(customer)
            }
            None => None,
        };

        let kinds = match request.channel.as_deref().filter(|code| !code.trim().is_empty()) {
            Some(code) => vec![code.parse::<ChannelKind>()?],
            None => ChannelKind::ALL.to_vec(),
        };

        Ok((customer, kinds))
    }

    /// Active configurations matching the request, in store order.
    fn targets(
        &self,
        request: &TransmissionRequest,
        report: &mut TransmissionReport,
    ) -> Result<Vec<Target>, ResolutionError> {
        let (customer, kinds) = self.resolve(request)?;
        let customer_uuid = customer.as_ref().map(|customer| customer.uuid);

        let mut targets = Vec::new();
        for kind in kinds {
            for configuration in self
                .configurations
                .active_configurations(kind, customer_uuid.as_ref())?
            {
                let resolved = match &customer {
                    Some(customer) => Some(customer.clone()),
                    None => self.directory.customer(&configuration.enterprise_customer_uuid)?,
                };
                match resolved {
                    Some(customer) => targets.push(Target {
                        configuration,
                        customer,
                    }),
                    None => {
                        warn!(
                            configuration = %configuration,
                            "skipping configuration whose enterprise customer does not resolve"
                        );
                        report.skipped += 1;
                    }
                }
            }
        }

        if let Some(uuid) = customer_uuid {
            if targets.is_empty() {
                return Err(ResolutionError::NoActiveChannel(uuid));
            }
        }

        Ok(targets)
    }

    /// Send each matching customer's catalog to its channels.
    pub fn transmit_courseware(
        &self,
        request: &TransmissionRequest,
    ) -> Result<TransmissionReport, ResolutionError> {
        let mut report = TransmissionReport::default();
        let targets = self.targets(request, &mut report)?;

        for target in targets {
            let Target {
                configuration,
                customer,
            } = target;
            if customer.catalog.is_none() {
                debug!(enterprise = %customer.uuid, "skipping enterprise customer without a catalog");
                report.skipped += 1;
                continue;
            }

            let _span = info_span!(
                "transmit_courseware",
                user = %request.acting_user,
                channel = configuration.channel_code(),
                configuration_id = configuration.id
            )
            .entered();
            info!(
                configuration = %configuration,
                "processing courses for integrated channel"
            );

            let succeeded = self.transmit_catalog(&configuration, &customer);
            report.record(succeeded);
        }

        report.log_summary("transmit-courseware-data");
        Ok(report)
    }

    fn transmit_catalog(&self, configuration: &ChannelConfiguration, customer: &EnterpriseCustomer) -> bool {
        let client = match self.clients.client_for(configuration) {
            Ok(client) => client,
            Err(err) => {
                error!(configuration = %configuration, error = %err, "could not build channel client");
                return false;
            }
        };

        let mut transmitter =
            CourseTransmitter::new(configuration, client.as_ref(), self.audits.as_ref());
        let audit =
            match CourseExporter::new(customer, self.catalog.as_ref(), &self.settings, Utc::now()) {
                Ok(mut exporter) => transmitter.transmit(&mut exporter),
                Err(err) => transmitter.record_export_failure(&err),
            };
        match audit {
            Ok(audit) => audit.is_successful(),
            Err(err) => {
                error!(configuration = %configuration, error = %err, "could not record catalog audit");
                false
            }
        }
    }

    /// Send completion records for each matching customer's enrollments.
    pub fn transmit_learner_data(
        &self,
        request: &TransmissionRequest,
        progress: &dyn LearnerProgressSource,
    ) -> Result<TransmissionReport, ResolutionError> {
        let mut report = TransmissionReport::default();
        let targets = self.targets(request, &mut report)?;

        for target in targets {
            let Target {
                configuration,
                customer,
            } = target;
            let _span = info_span!(
                "transmit_learner_data",
                user = %request.acting_user,
                channel = configuration.channel_code(),
                configuration_id = configuration.id
            )
            .entered();

            self.transmit_learners(&configuration, &customer, progress, &mut report);
        }

        report.log_summary("transmit-learner-data");
        Ok(report)
    }

    fn transmit_learners(
        &self,
        configuration: &ChannelConfiguration,
        customer: &EnterpriseCustomer,
        progress: &dyn LearnerProgressSource,
        report: &mut TransmissionReport,
    ) {
        let client = match self.clients.client_for(configuration) {
            Ok(client) => client,
            Err(err) => {
                error!(configuration = %configuration, error = %err, "could not build channel client");
                report.record(false);
                return;
            }
        };

        let exporter = LearnerExporter::new(
            customer,
            self.directory.as_ref(),
            &self.consent,
            progress,
            &self.settings.provider_id,
            Utc::now(),
        );
        let export = match exporter.collect_learner_data() {
            Ok(export) => export,
            Err(err) => {
                error!(configuration = %configuration, error = %err, "could not collect learner data");
                report.record(false);
                return;
            }
        };
        report.skipped += export.skipped;

        let mut transmitter =
            LearnerDataTransmitter::new(configuration, client.as_ref(), self.audits.as_ref());
        for record in export.records {
            let enrollment_id = record.enterprise_course_enrollment_id;
            match transmitter.transmit(record) {
                Ok(Some(audit)) => report.record(audit.is_successful()),
                Ok(None) => report.suppressed += 1,
                Err(err) => {
                    error!(enrollment_id, error = %err, "could not record learner audit");
                    report.record(false);
                }
            }
        }
    }
}
