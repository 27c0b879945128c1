use uuid::Uuid;

use super::audit::{CatalogTransmissionAudit, LearnerTransmissionAudit};
use super::configuration::{ChannelConfiguration, ChannelKind};
use crate::store::RepositoryError;

/// Read access to channel configurations. Configurations are returned in
/// store order so runs process them deterministically.
pub trait ChannelConfigurationRepository: Send + Sync {
    fn active_configurations(
        &self,
        kind: ChannelKind,
        customer: Option<&Uuid>,
    ) -> Result<Vec<ChannelConfiguration>, RepositoryError>;
}

/// Append-only audit storage.
pub trait AuditRepository: Send + Sync {
    /// Catalog audits for a customer, oldest first.
    fn catalog_audits(
        &self,
        customer: &Uuid,
    ) -> Result<Vec<CatalogTransmissionAudit>, RepositoryError>;
    fn record_catalog_audit(
        &self,
        audit: CatalogTransmissionAudit,
    ) -> Result<CatalogTransmissionAudit, RepositoryError>;

    /// Learner audits for an enrollment, oldest first.
    fn learner_audits(
        &self,
        enterprise_course_enrollment_id: u64,
    ) -> Result<Vec<LearnerTransmissionAudit>, RepositoryError>;
    fn record_learner_audit(
        &self,
        audit: LearnerTransmissionAudit,
    ) -> Result<LearnerTransmissionAudit, RepositoryError>;
}

/// Summary of the newest successful catalog transmission, if any.
pub fn latest_successful_catalog_audit(
    audits: &dyn AuditRepository,
    customer: &Uuid,
) -> Result<Option<CatalogTransmissionAudit>, RepositoryError> {
    Ok(audits
        .catalog_audits(customer)?
        .into_iter()
        .rev()
        .find(CatalogTransmissionAudit::is_successful))
}
