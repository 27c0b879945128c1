use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;
use uuid::Uuid;

use crate::catalog::{CatalogCourse, CatalogError, CatalogService, SearchQuery};
use crate::consent::{
    consent_router, ConsentKey, ConsentPolicyEngine, ConsentRecord, ConsentRepository,
    ConsentService,
};
use crate::enterprise::{
    EnterpriseCourseEnrollment, EnterpriseCustomer, EnterpriseDirectory, PlatformUser,
};
use crate::store::RepositoryError;

pub(super) const COURSE: &str = "course-v1:X+1";
pub(super) const PROGRAM: &str = "program-data-science";

pub(super) fn customer_uuid() -> Uuid {
    Uuid::parse_str("2f7ac3b0-6b1e-4d7e-9d3a-0f3c5a1b9e11").expect("valid uuid")
}

pub(super) fn enforcing_customer() -> EnterpriseCustomer {
    let mut customer = EnterpriseCustomer::new(customer_uuid(), "Veridian Dynamics");
    customer.enable_data_sharing_consent = true;
    customer.catalog = Some(7);
    customer
}

#[derive(Default)]
pub(super) struct MemoryConsents {
    records: Mutex<HashMap<ConsentKey, ConsentRecord>>,
    writes: Mutex<usize>,
}

impl MemoryConsents {
    pub(super) fn seed(&self, record: ConsentRecord) {
        self.records
            .lock()
            .expect("consent lock")
            .insert(record.key(), record);
    }

    pub(super) fn get(&self, key: &ConsentKey) -> Option<ConsentRecord> {
        self.records.lock().expect("consent lock").get(key).cloned()
    }

    pub(super) fn writes(&self) -> usize {
        *self.writes.lock().expect("write lock")
    }
}

impl ConsentRepository for MemoryConsents {
    fn fetch(&self, key: &ConsentKey) -> Result<Option<ConsentRecord>, RepositoryError> {
        Ok(self.get(key).map(ConsentRecord::materialized))
    }

    fn upsert(&self, record: ConsentRecord) -> Result<ConsentRecord, RepositoryError> {
        *self.writes.lock().expect("write lock") += 1;
        let record = record.materialized();
        self.seed(record.clone());
        Ok(record)
    }
}

pub(super) struct UnavailableConsents;

impl ConsentRepository for UnavailableConsents {
    fn fetch(&self, _: &ConsentKey) -> Result<Option<ConsentRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("consent store offline".to_string()))
    }

    fn upsert(&self, _: ConsentRecord) -> Result<ConsentRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("consent store offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryDirectory {
    customers: Mutex<BTreeMap<Uuid, EnterpriseCustomer>>,
}

impl MemoryDirectory {
    pub(super) fn with(customer: EnterpriseCustomer) -> Self {
        let directory = Self::default();
        directory
            .customers
            .lock()
            .expect("directory lock")
            .insert(customer.uuid, customer);
        directory
    }
}

impl EnterpriseDirectory for MemoryDirectory {
    fn customer(&self, uuid: &Uuid) -> Result<Option<EnterpriseCustomer>, RepositoryError> {
        Ok(self.customers.lock().expect("directory lock").get(uuid).cloned())
    }

    fn user(&self, username: &str) -> Result<Option<PlatformUser>, RepositoryError> {
        Ok(Some(PlatformUser {
            username: username.to_string(),
            is_staff: false,
        }))
    }

    fn enrollments_for(&self, _: &Uuid) -> Result<Vec<EnterpriseCourseEnrollment>, RepositoryError> {
        Ok(Vec::new())
    }
}

/// Catalog holding a fixed set of course ids and program memberships.
#[derive(Default)]
pub(super) struct StubCatalog {
    courses: HashSet<String>,
    programs: HashMap<String, Vec<String>>,
    lookups: Mutex<usize>,
}

impl StubCatalog {
    pub(super) fn containing(courses: &[&str]) -> Self {
        Self {
            courses: courses.iter().map(|course| course.to_string()).collect(),
            ..Self::default()
        }
    }

    pub(super) fn with_program(mut self, program_id: &str, courses: &[&str]) -> Self {
        self.programs.insert(
            program_id.to_string(),
            courses.iter().map(|course| course.to_string()).collect(),
        );
        self
    }

    pub(super) fn lookups(&self) -> usize {
        *self.lookups.lock().expect("lookup lock")
    }
}

impl CatalogService for StubCatalog {
    fn is_course_in_catalog(&self, _: u32, course_id: &str) -> Result<bool, CatalogError> {
        *self.lookups.lock().expect("lookup lock") += 1;
        Ok(self.courses.contains(course_id))
    }

    fn get_search_results(&self, query: &SearchQuery) -> Result<Vec<CatalogCourse>, CatalogError> {
        let keys = query
            .get(SearchQuery::PROGRAM)
            .and_then(|program| self.programs.get(program))
            .cloned()
            .unwrap_or_default();
        Ok(keys
            .into_iter()
            .map(|key| CatalogCourse::new(key.clone(), key))
            .collect())
    }
}

pub(super) struct Harness {
    pub(super) consents: Arc<MemoryConsents>,
    pub(super) catalog: Arc<StubCatalog>,
    pub(super) engine: ConsentPolicyEngine,
}

pub(super) fn harness(customer: Option<EnterpriseCustomer>, catalog: StubCatalog) -> Harness {
    let consents = Arc::new(MemoryConsents::default());
    let catalog = Arc::new(catalog);
    let directory = match customer {
        Some(customer) => MemoryDirectory::with(customer),
        None => MemoryDirectory::default(),
    };
    let engine = ConsentPolicyEngine::new(consents.clone(), Arc::new(directory), catalog.clone());
    Harness {
        consents,
        catalog,
        engine,
    }
}

pub(super) fn standard_harness() -> Harness {
    harness(
        Some(enforcing_customer()),
        StubCatalog::containing(&[COURSE]),
    )
}

pub(super) fn record(course_id: &str, granted: Option<bool>) -> ConsentRecord {
    let mut record = ConsentRecord::unsaved(ConsentKey::new("alice", course_id, customer_uuid()));
    record.granted = granted;
    record
}

pub(super) fn consent_router_for(harness: &Harness) -> axum::Router {
    consent_router(Arc::new(ConsentService::new(harness.engine.clone())))
}

pub(super) async fn json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json body")
}
