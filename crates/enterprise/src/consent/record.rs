use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a consent record: one learner, one course, one customer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConsentKey {
    pub username: String,
    pub course_id: String,
    pub enterprise_customer_uuid: Uuid,
}

impl ConsentKey {
    pub fn new(username: impl Into<String>, course_id: impl Into<String>, enterprise_customer_uuid: Uuid) -> Self {
        Self {
            username: username.into(),
            course_id: course_id.into(),
            enterprise_customer_uuid,
        }
    }
}

/// A learner's data-sharing consent for one course and one enterprise customer.
///
/// `exists` is derived: records read back from a repository are materialized,
/// records built by [`ConsentRecord::unsaved`] are not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub username: String,
    pub course_id: String,
    pub enterprise_customer_uuid: Uuid,
    #[serde(default)]
    pub granted: Option<bool>,
    #[serde(skip)]
    exists: bool,
    #[serde(skip)]
    program_id: Option<String>,
}

impl ConsentRecord {
    /// Placeholder for a triple with no persisted consent yet.
    pub fn unsaved(key: ConsentKey) -> Self {
        Self {
            username: key.username,
            course_id: key.course_id,
            enterprise_customer_uuid: key.enterprise_customer_uuid,
            granted: None,
            exists: false,
            program_id: None,
        }
    }

    /// Mark the record as backed by storage. Repositories call this on every
    /// record they hand out.
    pub fn materialized(mut self) -> Self {
        self.exists = true;
        self
    }

    pub fn key(&self) -> ConsentKey {
        ConsentKey::new(
            self.username.clone(),
            self.course_id.clone(),
            self.enterprise_customer_uuid,
        )
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn is_granted(&self) -> bool {
        self.granted == Some(true)
    }

    pub fn program_id(&self) -> Option<&str> {
        self.program_id.as_deref()
    }

    pub(crate) fn with_program(mut self, program_id: Option<String>) -> Self {
        self.program_id = program_id;
        self
    }
}
