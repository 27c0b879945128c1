//! Data-sharing consent: per-course records, program-level proxy consent,
//! the policy engine deciding when consent is required, and the HTTP API.

pub mod policy;
pub mod proxy;
pub mod record;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use policy::ConsentPolicyEngine;
pub use proxy::{ConsentDetails, ConsentView, InvalidProxyConsent, ProgramConsent};
pub use record::{ConsentKey, ConsentRecord};
pub use repository::{proxied_get, ConsentRepository};
pub use router::{consent_router, CONSENT_PATH};
pub use service::{
    ConsentQuery, ConsentRequest, ConsentRequestError, ConsentService, ConsentServiceError,
    ConsentTarget,
};
