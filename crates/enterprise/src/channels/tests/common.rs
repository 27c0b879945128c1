use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use tracing_subscriber::fmt::MakeWriter;
use uuid::Uuid;

use crate::catalog::{CatalogCourse, CatalogError, CatalogService, SearchQuery};
use crate::channels::{
    ChannelClient, ChannelClientFactory, ChannelConfiguration, ChannelCredentials, ChannelResponse,
    SapCredentials, TransmissionError, TransmissionOrchestrator,
};
use crate::config::ChannelSettings;
use crate::consent::ConsentPolicyEngine;
use crate::enterprise::{EnterpriseCourseEnrollment, EnterpriseCustomer, PlatformUser};
use crate::store::SnapshotStore;

pub(super) const ACTING_USER: &str = "C-3PO";
pub(super) const DEMO_COURSE: &str = "course-v1:edX+DemoX+Demo_Course";
pub(super) const DEMO_TITLE: &str = "edX Demonstration Course";

/// 2017-01-02T03:04:05Z
pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2017, 1, 2, 3, 4, 5).unwrap()
}

pub(super) fn customer_uuid() -> Uuid {
    Uuid::parse_str("47130371-0b6d-43f5-01de-71942664de2b").expect("valid uuid")
}

pub(super) fn customer(uuid: Uuid, name: &str, catalog: Option<u32>) -> EnterpriseCustomer {
    let mut customer = EnterpriseCustomer::new(uuid, name);
    customer.enable_data_sharing_consent = true;
    customer.catalog = catalog;
    customer
}

pub(super) fn demo_course(key: &str) -> CatalogCourse {
    let mut course = CatalogCourse::new(key, DEMO_TITLE);
    course.start = Some(Utc.with_ymd_and_hms(2013, 2, 5, 5, 0, 0).unwrap());
    course
}

pub(super) fn sap_configuration(id: u64, customer: Uuid) -> ChannelConfiguration {
    ChannelConfiguration {
        id,
        enterprise_customer_uuid: customer,
        active: true,
        credentials: ChannelCredentials::SapSuccessFactors(SapCredentials {
            base_url: "http://sapsf.example.com".to_string(),
            company_id: "company".to_string(),
            user_id: "admin".to_string(),
            key: "client-id".to_string(),
            secret: "client-secret".to_string(),
        }),
    }
}

pub(super) fn enrollment(id: u64, customer: Uuid, username: &str, course_id: &str) -> EnterpriseCourseEnrollment {
    EnterpriseCourseEnrollment {
        id,
        enterprise_customer_uuid: customer,
        username: username.to_string(),
        course_id: course_id.to_string(),
        mode: "verified".to_string(),
        remote_user_id: Some(format!("remote-{username}")),
    }
}

/// Store holding the acting user and the given customers.
pub(super) fn store_with(customers: &[EnterpriseCustomer]) -> Arc<SnapshotStore> {
    let store = SnapshotStore::in_memory();
    store
        .insert_user(PlatformUser {
            username: ACTING_USER.to_string(),
            is_staff: true,
        })
        .unwrap();
    for customer in customers {
        store.insert_customer(customer.clone()).unwrap();
    }
    Arc::new(store)
}

pub(super) fn consent_engine(store: &Arc<SnapshotStore>) -> ConsentPolicyEngine {
    ConsentPolicyEngine::new(store.clone(), store.clone(), store.clone())
}

#[derive(Debug, Clone, Copy)]
enum Behavior {
    Respond(u16),
    Fail(&'static str),
}

/// Channel client answering every call the same way and remembering payloads.
pub(super) struct RecordingClient {
    behavior: Behavior,
    course_imports: Mutex<Vec<String>>,
    completions: Mutex<Vec<(String, String)>>,
}

impl RecordingClient {
    fn with(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            course_imports: Mutex::new(Vec::new()),
            completions: Mutex::new(Vec::new()),
        })
    }

    pub(super) fn succeeding() -> Arc<Self> {
        Self::with(Behavior::Respond(200))
    }

    pub(super) fn failing() -> Arc<Self> {
        Self::with(Behavior::Fail("error occurred"))
    }

    pub(super) fn course_imports(&self) -> Vec<String> {
        self.course_imports.lock().unwrap().clone()
    }

    pub(super) fn completions(&self) -> Vec<(String, String)> {
        self.completions.lock().unwrap().clone()
    }

    fn respond(&self) -> Result<ChannelResponse, TransmissionError> {
        match self.behavior {
            Behavior::Respond(status) => Ok(ChannelResponse::new(status, "{}")),
            Behavior::Fail(message) => Err(TransmissionError::Request(message.to_string())),
        }
    }
}

impl ChannelClient for RecordingClient {
    fn send_course_import(&self, payload: &str) -> Result<ChannelResponse, TransmissionError> {
        self.course_imports.lock().unwrap().push(payload.to_string());
        self.respond()
    }

    fn send_completion_status(
        &self,
        external_user_id: &str,
        payload: &str,
    ) -> Result<ChannelResponse, TransmissionError> {
        self.completions
            .lock()
            .unwrap()
            .push((external_user_id.to_string(), payload.to_string()));
        self.respond()
    }
}

impl ChannelClient for Arc<RecordingClient> {
    fn send_course_import(&self, payload: &str) -> Result<ChannelResponse, TransmissionError> {
        RecordingClient::send_course_import(self, payload)
    }

    fn send_completion_status(
        &self,
        external_user_id: &str,
        payload: &str,
    ) -> Result<ChannelResponse, TransmissionError> {
        RecordingClient::send_completion_status(self, external_user_id, payload)
    }
}

/// Hands out a prepared client per configuration id.
#[derive(Default)]
pub(super) struct FakeClients {
    clients: HashMap<u64, Arc<RecordingClient>>,
}

impl FakeClients {
    pub(super) fn with(mut self, configuration_id: u64, client: &Arc<RecordingClient>) -> Self {
        self.clients.insert(configuration_id, Arc::clone(client));
        self
    }
}

impl ChannelClientFactory for FakeClients {
    fn client_for(
        &self,
        configuration: &ChannelConfiguration,
    ) -> Result<Box<dyn ChannelClient>, TransmissionError> {
        self.clients
            .get(&configuration.id)
            .map(|client| Box::new(Arc::clone(client)) as Box<dyn ChannelClient>)
            .ok_or_else(|| TransmissionError::Authentication("no client configured".to_string()))
    }
}

pub(super) fn orchestrator(store: &Arc<SnapshotStore>, clients: FakeClients) -> TransmissionOrchestrator {
    orchestrator_with_catalog(store, store.clone(), clients)
}

pub(super) fn orchestrator_with_catalog(
    store: &Arc<SnapshotStore>,
    catalog: Arc<dyn CatalogService>,
    clients: FakeClients,
) -> TransmissionOrchestrator {
    TransmissionOrchestrator::new(
        store.clone(),
        store.clone(),
        store.clone(),
        catalog,
        consent_engine(store),
        Arc::new(clients),
        ChannelSettings::default(),
    )
}

/// Catalog service that is always down.
pub(super) struct OfflineCatalog;

impl CatalogService for OfflineCatalog {
    fn is_course_in_catalog(&self, _: u32, _: &str) -> Result<bool, CatalogError> {
        Err(CatalogError::Unavailable("connection refused".to_string()))
    }

    fn get_search_results(&self, _: &SearchQuery) -> Result<Vec<CatalogCourse>, CatalogError> {
        Err(CatalogError::Unavailable("connection refused".to_string()))
    }
}

/// In-memory sink for formatted log lines.
#[derive(Clone, Default)]
pub(super) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `f` with debug-level logging captured, returning its result and the log text.
pub(super) fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let value = tracing::subscriber::with_default(subscriber, f);
    let text = String::from_utf8_lossy(&logs.0.lock().unwrap()).into_owned();
    (value, text)
}
