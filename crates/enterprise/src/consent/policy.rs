use std::sync::Arc;

use tracing::{debug, debug_span};
use uuid::Uuid;

use super::record::{ConsentKey, ConsentRecord};
use super::repository::ConsentRepository;
use crate::catalog::CatalogService;
use crate::enterprise::{ConsentEnforcement, EnterpriseCustomer, EnterpriseDirectory};
use crate::store::RepositoryError;

/// Read-only consent decisions over the consent store, the customer directory
/// and the catalog service.
#[derive(Clone)]
pub struct ConsentPolicyEngine {
    consents: Arc<dyn ConsentRepository>,
    directory: Arc<dyn EnterpriseDirectory>,
    catalog: Arc<dyn CatalogService>,
}

impl ConsentPolicyEngine {
    pub fn new(
        consents: Arc<dyn ConsentRepository>,
        directory: Arc<dyn EnterpriseDirectory>,
        catalog: Arc<dyn CatalogService>,
    ) -> Self {
        Self {
            consents,
            directory,
            catalog,
        }
    }

    pub fn consents(&self) -> &dyn ConsentRepository {
        self.consents.as_ref()
    }

    pub fn catalog(&self) -> &dyn CatalogService {
        self.catalog.as_ref()
    }

    pub fn customer(&self, uuid: &Uuid) -> Result<Option<EnterpriseCustomer>, RepositoryError> {
        self.directory.customer(uuid)
    }

    /// The persisted record for the triple, if its customer resolves.
    fn materialized_record(
        &self,
        username: &str,
        course_id: &str,
        customer_uuid: &Uuid,
    ) -> Result<Option<ConsentRecord>, RepositoryError> {
        if self.directory.customer(customer_uuid)?.is_none() {
            return Ok(None);
        }
        self.consents
            .fetch(&ConsentKey::new(username, course_id, *customer_uuid))
    }

    pub fn consent_exists(
        &self,
        username: &str,
        course_id: &str,
        customer_uuid: &Uuid,
    ) -> Result<bool, RepositoryError> {
        Ok(self
            .materialized_record(username, course_id, customer_uuid)?
            .map(|record| record.exists())
            .unwrap_or(false))
    }

    pub fn consent_provided(
        &self,
        username: &str,
        course_id: &str,
        customer_uuid: &Uuid,
    ) -> Result<bool, RepositoryError> {
        Ok(self
            .materialized_record(username, course_id, customer_uuid)?
            .map(|record| record.is_granted())
            .unwrap_or(false))
    }

    /// Whether the learner still has to act before data can be shared.
    ///
    /// Catalog membership is always evaluated against the customer's own
    /// catalog; `request_user` only annotates the trace.
    pub fn consent_required(
        &self,
        request_user: &str,
        username: &str,
        course_id: &str,
        customer_uuid: &Uuid,
    ) -> Result<bool, RepositoryError> {
        let _span = debug_span!("consent_required", request_user, username, course_id).entered();

        if self.consent_provided(username, course_id, customer_uuid)? {
            return Ok(false);
        }
        let customer = self.directory.customer(customer_uuid)?;
        Ok(decide_requirement(false, customer.as_ref(), |customer| {
            customer.catalog_contains_course(self.catalog.as_ref(), course_id)
        }))
    }

    /// Requirement for an in-memory record, using its current `granted` state
    /// rather than what is stored.
    pub fn record_requires_consent(
        &self,
        record: &ConsentRecord,
        request_user: &str,
    ) -> Result<bool, RepositoryError> {
        let _span = debug_span!(
            "record_requires_consent",
            request_user,
            username = %record.username,
            course_id = %record.course_id
        )
        .entered();

        let customer = self.directory.customer(&record.enterprise_customer_uuid)?;
        Ok(decide_requirement(
            record.is_granted(),
            customer.as_ref(),
            |customer| customer.catalog_contains_course(self.catalog.as_ref(), &record.course_id),
        ))
    }
}

/// Consent is required when it has not been granted, the customer resolves,
/// enforces consent at enrollment, and carries the course in its catalog.
/// The catalog is only consulted once every cheaper condition holds.
pub(crate) fn decide_requirement(
    granted: bool,
    customer: Option<&EnterpriseCustomer>,
    in_catalog: impl FnOnce(&EnterpriseCustomer) -> bool,
) -> bool {
    if granted {
        return false;
    }
    let Some(customer) = customer else {
        debug!("consent customer did not resolve; nothing to require");
        return false;
    };
    customer.enforces_data_sharing_consent(ConsentEnforcement::AtEnrollment) && in_catalog(customer)
}
