//! Enterprise customers, their learners, and their course enrollments.
//!
//! These records are owned by the wider platform; the consent and channel
//! modules only read them through the directory traits below.

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::catalog::CatalogService;
use crate::store::RepositoryError;

/// Point in the learner journey where data-sharing consent is collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConsentEnforcement {
    #[default]
    AtEnrollment,
    ExternallyManaged,
}

/// Organization consuming courses on behalf of its learners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnterpriseCustomer {
    pub uuid: Uuid,
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub catalog: Option<u32>,
    #[serde(default)]
    pub enable_data_sharing_consent: bool,
    #[serde(default)]
    pub enforce_data_sharing_consent: ConsentEnforcement,
    #[serde(default)]
    pub identity_provider: Option<String>,
    #[serde(default)]
    pub enable_audit_enrollment: bool,
    #[serde(default)]
    pub enable_audit_data_reporting: bool,
}

fn default_true() -> bool {
    true
}

impl EnterpriseCustomer {
    pub fn new(uuid: Uuid, name: impl Into<String>) -> Self {
        Self {
            uuid,
            name: name.into(),
            active: true,
            catalog: None,
            enable_data_sharing_consent: false,
            enforce_data_sharing_consent: ConsentEnforcement::AtEnrollment,
            identity_provider: None,
            enable_audit_enrollment: false,
            enable_audit_data_reporting: false,
        }
    }

    /// Whether the customer asks learners for consent at all.
    pub fn requests_data_sharing_consent(&self) -> bool {
        self.enable_data_sharing_consent
            && self.enforce_data_sharing_consent != ConsentEnforcement::ExternallyManaged
    }

    pub fn enforces_data_sharing_consent(&self, location: ConsentEnforcement) -> bool {
        self.requests_data_sharing_consent() && self.enforce_data_sharing_consent == location
    }

    pub fn enables_audit_data_reporting(&self) -> bool {
        self.enable_audit_enrollment && self.enable_audit_data_reporting
    }

    /// Catalog membership for `course_id`. Customers without a catalog contain
    /// nothing, and an unreachable catalog service is treated as "not contained".
    pub fn catalog_contains_course(&self, catalog: &dyn CatalogService, course_id: &str) -> bool {
        let Some(catalog_id) = self.catalog else {
            return false;
        };

        match catalog.is_course_in_catalog(catalog_id, course_id) {
            Ok(contained) => contained,
            Err(err) => {
                warn!(
                    enterprise = %self.uuid,
                    catalog_id,
                    course_id,
                    error = %err,
                    "catalog membership check failed"
                );
                false
            }
        }
    }
}

/// Platform account able to act on behalf of a batch command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformUser {
    pub username: String,
    #[serde(default)]
    pub is_staff: bool,
}

/// Enrollment of an enterprise learner in a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnterpriseCourseEnrollment {
    pub id: u64,
    pub enterprise_customer_uuid: Uuid,
    pub username: String,
    pub course_id: String,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub remote_user_id: Option<String>,
}

fn default_mode() -> String {
    "verified".to_string()
}

impl EnterpriseCourseEnrollment {
    pub const AUDIT_MODES: [&'static str; 2] = ["audit", "honor"];

    pub fn is_audit_enrollment(&self) -> bool {
        Self::AUDIT_MODES.contains(&self.mode.as_str())
    }

    /// Audit-track enrollments are withheld from channels unless the customer
    /// opted into audit data reporting.
    pub fn audit_reporting_disabled(&self, customer: &EnterpriseCustomer) -> bool {
        if customer.enables_audit_data_reporting() {
            return false;
        }
        self.is_audit_enrollment()
    }
}

/// Read access to customers, platform users and enrollments.
pub trait EnterpriseDirectory: Send + Sync {
    /// Any customer, active or not.
    fn customer(&self, uuid: &Uuid) -> Result<Option<EnterpriseCustomer>, RepositoryError>;
    fn active_customer(&self, uuid: &Uuid) -> Result<Option<EnterpriseCustomer>, RepositoryError> {
        Ok(self.customer(uuid)?.filter(|customer| customer.active))
    }
    fn user(&self, username: &str) -> Result<Option<PlatformUser>, RepositoryError>;
    fn enrollments_for(
        &self,
        customer: &Uuid,
    ) -> Result<Vec<EnterpriseCourseEnrollment>, RepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogCourse, CatalogError, SearchQuery};

    struct FixedCatalog(Result<bool, ()>);

    impl CatalogService for FixedCatalog {
        fn is_course_in_catalog(&self, _: u32, _: &str) -> Result<bool, CatalogError> {
            self.0
                .map_err(|_| CatalogError::Unavailable("catalog offline".to_string()))
        }

        fn get_search_results(&self, _: &SearchQuery) -> Result<Vec<CatalogCourse>, CatalogError> {
            Ok(Vec::new())
        }
    }

    fn customer() -> EnterpriseCustomer {
        let mut customer = EnterpriseCustomer::new(Uuid::nil(), "Veridian Dynamics");
        customer.enable_data_sharing_consent = true;
        customer.catalog = Some(1);
        customer
    }

    #[test]
    fn externally_managed_consent_is_never_enforced_at_enrollment() {
        let mut customer = customer();
        assert!(customer.enforces_data_sharing_consent(ConsentEnforcement::AtEnrollment));

        customer.enforce_data_sharing_consent = ConsentEnforcement::ExternallyManaged;
        assert!(!customer.requests_data_sharing_consent());
        assert!(!customer.enforces_data_sharing_consent(ConsentEnforcement::AtEnrollment));
        assert!(!customer.enforces_data_sharing_consent(ConsentEnforcement::ExternallyManaged));
    }

    #[test]
    fn disabled_consent_is_not_enforced() {
        let mut customer = customer();
        customer.enable_data_sharing_consent = false;
        assert!(!customer.enforces_data_sharing_consent(ConsentEnforcement::AtEnrollment));
    }

    #[test]
    fn catalog_membership_fails_closed() {
        let customer = customer();
        assert!(customer.catalog_contains_course(&FixedCatalog(Ok(true)), "course-v1:X+1"));
        assert!(!customer.catalog_contains_course(&FixedCatalog(Err(())), "course-v1:X+1"));

        let mut without_catalog = customer.clone();
        without_catalog.catalog = None;
        assert!(!without_catalog.catalog_contains_course(&FixedCatalog(Ok(true)), "course-v1:X+1"));
    }

    #[test]
    fn audit_enrollments_report_only_when_enabled() {
        let mut customer = customer();
        let enrollment = EnterpriseCourseEnrollment {
            id: 1,
            enterprise_customer_uuid: customer.uuid,
            username: "alice".to_string(),
            course_id: "course-v1:X+1".to_string(),
            mode: "audit".to_string(),
            remote_user_id: None,
        };
        assert!(enrollment.audit_reporting_disabled(&customer));

        customer.enable_audit_enrollment = true;
        customer.enable_audit_data_reporting = true;
        assert!(!enrollment.audit_reporting_disabled(&customer));
    }
}
