use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::policy::ConsentPolicyEngine;
use super::proxy::{ConsentDetails, ConsentView, InvalidProxyConsent, ProgramConsent};
use super::record::ConsentKey;
use super::repository::proxied_get;
use crate::catalog::{program_course_keys, CatalogError};
use crate::store::RepositoryError;

/// Raw consent API parameters, from the query string or a JSON body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConsentQuery {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub course_id: Option<String>,
    #[serde(default)]
    pub program_id: Option<String>,
    #[serde(default)]
    pub enterprise_customer_uuid: Option<String>,
}

/// A consent request with every required parameter present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentRequest {
    pub username: String,
    pub course_id: Option<String>,
    pub program_id: Option<String>,
    pub enterprise_customer_uuid: String,
}

/// What the request asks about. A course id wins over a program id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentTarget<'a> {
    Course(&'a str),
    Program(&'a str),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error(
    "Some query parameter(s) missing: username '{username}', course_id '{course_id}', enterprise customer uuid '{enterprise_customer_uuid}'."
)]
pub struct ConsentRequestError {
    username: String,
    course_id: String,
    enterprise_customer_uuid: String,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

impl ConsentQuery {
    /// Take each parameter from `self`, falling back to `fallback` where absent.
    pub fn or(self, fallback: ConsentQuery) -> ConsentQuery {
        ConsentQuery {
            username: self.username.or(fallback.username),
            course_id: self.course_id.or(fallback.course_id),
            program_id: self.program_id.or(fallback.program_id),
            enterprise_customer_uuid: self
                .enterprise_customer_uuid
                .or(fallback.enterprise_customer_uuid),
        }
    }

    pub fn validate(self) -> Result<ConsentRequest, ConsentRequestError> {
        let username = present(self.username);
        let course_id = present(self.course_id);
        let program_id = present(self.program_id);
        let enterprise_customer_uuid = present(self.enterprise_customer_uuid);

        match (username, enterprise_customer_uuid) {
            (Some(username), Some(enterprise_customer_uuid))
                if course_id.is_some() || program_id.is_some() =>
            {
                Ok(ConsentRequest {
                    username,
                    course_id,
                    program_id,
                    enterprise_customer_uuid,
                })
            }
            (username, enterprise_customer_uuid) => Err(ConsentRequestError {
                username: username.unwrap_or_default(),
                course_id: course_id.unwrap_or_default(),
                enterprise_customer_uuid: enterprise_customer_uuid.unwrap_or_default(),
            }),
        }
    }
}

impl ConsentRequest {
    pub fn target(&self) -> ConsentTarget<'_> {
        match (&self.course_id, &self.program_id) {
            (Some(course_id), _) => ConsentTarget::Course(course_id),
            (None, Some(program_id)) => ConsentTarget::Program(program_id),
            // validate() guarantees one of the two; an empty course id keeps
            // the request harmless if that ever changes.
            (None, None) => ConsentTarget::Course(""),
        }
    }

    /// Permissive view returned when the enterprise customer does not resolve.
    pub fn no_record_details(&self) -> ConsentDetails {
        ConsentDetails::no_record(
            &self.username,
            &self.enterprise_customer_uuid,
            self.course_id.as_deref(),
            self.program_id.as_deref(),
        )
    }
}

/// Error raised by the consent service.
#[derive(Debug, thiserror::Error)]
pub enum ConsentServiceError {
    #[error(transparent)]
    Request(#[from] ConsentRequestError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Proxy(#[from] InvalidProxyConsent),
}

/// Consent API operations: read, grant and proactively refuse consent.
#[derive(Clone)]
pub struct ConsentService {
    engine: ConsentPolicyEngine,
}

impl ConsentService {
    pub fn new(engine: ConsentPolicyEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &ConsentPolicyEngine {
        &self.engine
    }

    /// Resolve the record or program view for a request. `None` when the
    /// enterprise customer cannot be resolved or the program has no courses.
    pub fn lookup(&self, request: &ConsentRequest) -> Result<Option<ConsentView>, ConsentServiceError> {
        let Ok(customer_uuid) = Uuid::parse_str(&request.enterprise_customer_uuid) else {
            warn!(
                enterprise_customer_uuid = %request.enterprise_customer_uuid,
                "consent request names a malformed enterprise customer uuid"
            );
            return Ok(None);
        };
        if self.engine.customer(&customer_uuid)?.is_none() {
            return Ok(None);
        }

        let consents = self.engine.consents();
        match request.target() {
            ConsentTarget::Course(course_id) => {
                let key = ConsentKey::new(request.username.as_str(), course_id, customer_uuid);
                Ok(Some(ConsentView::Record(proxied_get(consents, key)?)))
            }
            ConsentTarget::Program(program_id) => {
                let course_keys = program_course_keys(self.engine.catalog(), program_id)?;
                let mut children = Vec::with_capacity(course_keys.len());
                for course_id in course_keys {
                    let key = ConsentKey::new(request.username.as_str(), course_id, customer_uuid);
                    children.push(proxied_get(consents, key)?);
                }

                match ProgramConsent::from_children(program_id, children) {
                    Ok(view) => Ok(Some(view)),
                    Err(InvalidProxyConsent::NoChildren { .. }) => {
                        info!(program_id, "program has no courses; answering without a record");
                        Ok(None)
                    }
                    Err(err) => Err(err.into()),
                }
            }
        }
    }

    /// GET: the current consent state.
    pub fn details(&self, request: &ConsentRequest, request_user: &str) -> Result<ConsentDetails, ConsentServiceError> {
        match self.lookup(request)? {
            Some(view) => Ok(view.serialize(&self.engine, request_user)?),
            None => Ok(request.no_record_details()),
        }
    }

    /// POST: grant consent, only when it is currently required.
    pub fn provide(&self, request: &ConsentRequest, request_user: &str) -> Result<ConsentDetails, ConsentServiceError> {
        let Some(mut view) = self.lookup(request)? else {
            return Ok(request.no_record_details());
        };

        if view.consent_required(&self.engine, request_user)? {
            view.set_granted(true);
            view = view.save(self.engine.consents())?;
            info!(
                username = %request.username,
                enterprise_customer_uuid = %request.enterprise_customer_uuid,
                "data sharing consent granted"
            );
        }

        Ok(view.serialize(&self.engine, request_user)?)
    }

    /// DELETE: refuse consent, creating the record if it never existed.
    pub fn revoke(&self, request: &ConsentRequest, request_user: &str) -> Result<ConsentDetails, ConsentServiceError> {
        let Some(mut view) = self.lookup(request)? else {
            return Ok(request.no_record_details());
        };

        view.set_granted(false);
        let view = view.save(self.engine.consents())?;
        info!(
            username = %request.username,
            enterprise_customer_uuid = %request.enterprise_customer_uuid,
            "data sharing consent refused"
        );

        Ok(view.serialize(&self.engine, request_user)?)
    }
}
