use serde::Serialize;
use uuid::Uuid;

use super::policy::ConsentPolicyEngine;
use super::record::ConsentRecord;
use super::repository::ConsentRepository;
use crate::store::RepositoryError;

/// Serialized view of a consent decision, shared by records and programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsentDetails {
    pub username: String,
    pub enterprise_customer_uuid: String,
    pub exists: bool,
    pub consent_provided: bool,
    pub consent_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_id: Option<String>,
}

impl ConsentDetails {
    /// Permissive answer for a customer that does not resolve.
    pub fn no_record(
        username: &str,
        enterprise_customer_uuid: &str,
        course_id: Option<&str>,
        program_id: Option<&str>,
    ) -> Self {
        Self {
            username: username.to_string(),
            enterprise_customer_uuid: enterprise_customer_uuid.to_string(),
            exists: false,
            consent_provided: false,
            consent_required: false,
            course_id: course_id.map(str::to_string),
            program_id: program_id.map(str::to_string),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidProxyConsent {
    #[error("program {program_id} has no courses to consent to")]
    NoChildren { program_id: String },
    #[error("program {program_id} consents span more than one learner or enterprise customer")]
    MixedOwners { program_id: String },
}

/// Virtual consent over every course of a program. Never persisted itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramConsent {
    program_id: String,
    username: String,
    enterprise_customer_uuid: Uuid,
    children: Vec<ConsentRecord>,
}

impl ProgramConsent {
    /// Build the consent view for a program.
    ///
    /// A single child degenerates to that record (still reporting
    /// `program_id`); several children form an aggregate.
    pub fn from_children(
        program_id: impl Into<String>,
        children: Vec<ConsentRecord>,
    ) -> Result<ConsentView, InvalidProxyConsent> {
        let program_id = program_id.into();
        let mut children = children;

        let Some(first) = children.first() else {
            return Err(InvalidProxyConsent::NoChildren { program_id });
        };
        let username = first.username.clone();
        let enterprise_customer_uuid = first.enterprise_customer_uuid;

        if children.iter().any(|child| {
            child.username != username || child.enterprise_customer_uuid != enterprise_customer_uuid
        }) {
            return Err(InvalidProxyConsent::MixedOwners { program_id });
        }

        if children.len() == 1 {
            let only = children.remove(0).with_program(Some(program_id));
            return Ok(ConsentView::Record(only));
        }

        let children = children
            .into_iter()
            .map(|child| child.with_program(None))
            .collect();

        Ok(ConsentView::Program(Self {
            program_id,
            username,
            enterprise_customer_uuid,
            children,
        }))
    }

    pub fn program_id(&self) -> &str {
        &self.program_id
    }

    pub fn children(&self) -> &[ConsentRecord] {
        &self.children
    }

    /// Granted only when every course is granted.
    pub fn granted(&self) -> bool {
        self.children.iter().all(ConsentRecord::is_granted)
    }

    pub fn exists(&self) -> bool {
        self.children.iter().any(ConsentRecord::exists)
    }
}

/// One consent decision, whether it covers a course or a whole program.
/// Callers treat both shapes uniformly through these methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsentView {
    Record(ConsentRecord),
    Program(ProgramConsent),
}

impl ConsentView {
    pub fn username(&self) -> &str {
        match self {
            ConsentView::Record(record) => &record.username,
            ConsentView::Program(program) => &program.username,
        }
    }

    pub fn enterprise_customer_uuid(&self) -> Uuid {
        match self {
            ConsentView::Record(record) => record.enterprise_customer_uuid,
            ConsentView::Program(program) => program.enterprise_customer_uuid,
        }
    }

    pub fn exists(&self) -> bool {
        match self {
            ConsentView::Record(record) => record.exists(),
            ConsentView::Program(program) => program.exists(),
        }
    }

    pub fn consent_provided(&self) -> bool {
        match self {
            ConsentView::Record(record) => record.is_granted(),
            ConsentView::Program(program) => program.granted(),
        }
    }

    /// Apply a consent decision in memory; [`ConsentView::save`] persists it.
    pub fn set_granted(&mut self, granted: bool) {
        match self {
            ConsentView::Record(record) => record.granted = Some(granted),
            ConsentView::Program(program) => {
                for child in &mut program.children {
                    child.granted = Some(granted);
                }
            }
        }
    }

    /// OR over every course the view covers.
    pub fn consent_required(
        &self,
        engine: &ConsentPolicyEngine,
        request_user: &str,
    ) -> Result<bool, RepositoryError> {
        match self {
            ConsentView::Record(record) => engine.record_requires_consent(record, request_user),
            ConsentView::Program(program) => {
                for child in &program.children {
                    if engine.record_requires_consent(child, request_user)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Persist every covered record and return the refreshed view, which may
    /// be a single record or an aggregate.
    pub fn save(self, repository: &dyn ConsentRepository) -> Result<ConsentView, RepositoryError> {
        match self {
            ConsentView::Record(record) => {
                let program_id = record.program_id().map(str::to_string);
                let saved = repository.upsert(record.with_program(None))?;
                Ok(ConsentView::Record(saved.with_program(program_id)))
            }
            ConsentView::Program(program) => {
                let mut saved = Vec::with_capacity(program.children.len());
                for child in program.children {
                    saved.push(repository.upsert(child)?);
                }
                Ok(ConsentView::Program(ProgramConsent {
                    children: saved,
                    ..program
                }))
            }
        }
    }

    /// `consent_required` is recomputed from current state on every call.
    pub fn serialize(
        &self,
        engine: &ConsentPolicyEngine,
        request_user: &str,
    ) -> Result<ConsentDetails, RepositoryError> {
        let (course_id, program_id) = match self {
            ConsentView::Record(record) => (
                Some(record.course_id.clone()).filter(|id| !id.is_empty()),
                record.program_id().map(str::to_string),
            ),
            ConsentView::Program(program) => (None, Some(program.program_id.clone())),
        };

        Ok(ConsentDetails {
            username: self.username().to_string(),
            enterprise_customer_uuid: self.enterprise_customer_uuid().to_string(),
            exists: self.exists(),
            consent_provided: self.consent_provided(),
            consent_required: self.consent_required(engine, request_user)?,
            course_id,
            program_id,
        })
    }
}
