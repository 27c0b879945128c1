use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::RepositoryError;
use crate::catalog::{CatalogCourse, CatalogError, CatalogService, SearchQuery};
use crate::channels::export::{LearnerProgress, LearnerProgressSource};
use crate::channels::{
    AuditRepository, CatalogTransmissionAudit, ChannelConfiguration,
    ChannelConfigurationRepository, ChannelKind, LearnerTransmissionAudit,
};
use crate::consent::{ConsentKey, ConsentRecord, ConsentRepository};
use crate::enterprise::{
    EnterpriseCourseEnrollment, EnterpriseCustomer, EnterpriseDirectory, PlatformUser,
};

/// Everything the store holds, as written to disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub customers: Vec<EnterpriseCustomer>,
    #[serde(default)]
    pub users: Vec<PlatformUser>,
    #[serde(default)]
    pub enrollments: Vec<EnterpriseCourseEnrollment>,
    #[serde(default)]
    pub consents: Vec<ConsentRecord>,
    #[serde(default)]
    pub channel_configurations: Vec<ChannelConfiguration>,
    #[serde(default)]
    pub catalog_audits: Vec<CatalogTransmissionAudit>,
    #[serde(default)]
    pub learner_audits: Vec<LearnerTransmissionAudit>,
    /// Catalog id to the course run keys it contains.
    #[serde(default)]
    pub catalogs: BTreeMap<u32, Vec<String>>,
    #[serde(default)]
    pub courses: Vec<CatalogCourse>,
    /// Program id to its course run keys.
    #[serde(default)]
    pub programs: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub progress: Vec<LearnerProgress>,
}

/// Storage backend implementing every repository trait over one snapshot.
///
/// With a path, the snapshot is rewritten after each write (temp file then
/// rename). Without one it lives in memory only.
pub struct SnapshotStore {
    path: Option<PathBuf>,
    state: Mutex<Snapshot>,
}

impl SnapshotStore {
    pub fn in_memory() -> Self {
        Self::from_snapshot(Snapshot::default())
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            path: None,
            state: Mutex::new(snapshot),
        }
    }

    /// Load the snapshot at `path`, starting empty when the file is missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let path = path.into();
        let snapshot = if path.exists() {
            let raw = fs::read(&path).map_err(|err| unavailable(&path, err))?;
            serde_json::from_slice(&raw).map_err(|err| unavailable(&path, err))?
        } else {
            info!(path = %path.display(), "snapshot store not found; starting empty");
            Snapshot::default()
        };

        Ok(Self {
            path: Some(path),
            state: Mutex::new(snapshot),
        })
    }

    pub fn snapshot(&self) -> Result<Snapshot, RepositoryError> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Snapshot>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("snapshot store lock poisoned".to_string()))
    }

    /// Apply a change to a copy, persist the copy, then swap it in. A failed
    /// change or write leaves the held snapshot untouched.
    fn write<T>(&self, change: impl FnOnce(&mut Snapshot) -> Result<T, RepositoryError>) -> Result<T, RepositoryError> {
        let mut state = self.lock()?;
        let mut next = state.clone();
        let value = change(&mut next)?;
        if let Some(path) = &self.path {
            persist(path, &next)?;
        }
        *state = next;
        Ok(value)
    }

    pub fn insert_customer(&self, customer: EnterpriseCustomer) -> Result<(), RepositoryError> {
        self.write(|state| {
            if state.customers.iter().any(|existing| existing.uuid == customer.uuid) {
                return Err(RepositoryError::Conflict);
            }
            state.customers.push(customer);
            Ok(())
        })
    }

    pub fn insert_user(&self, user: PlatformUser) -> Result<(), RepositoryError> {
        self.write(|state| {
            if state.users.iter().any(|existing| existing.username == user.username) {
                return Err(RepositoryError::Conflict);
            }
            state.users.push(user);
            Ok(())
        })
    }

    pub fn insert_enrollment(&self, enrollment: EnterpriseCourseEnrollment) -> Result<(), RepositoryError> {
        self.write(|state| {
            if state.enrollments.iter().any(|existing| existing.id == enrollment.id) {
                return Err(RepositoryError::Conflict);
            }
            state.enrollments.push(enrollment);
            Ok(())
        })
    }

    pub fn insert_channel_configuration(
        &self,
        configuration: ChannelConfiguration,
    ) -> Result<(), RepositoryError> {
        self.write(|state| {
            if state
                .channel_configurations
                .iter()
                .any(|existing| existing.id == configuration.id)
            {
                return Err(RepositoryError::Conflict);
            }
            state.channel_configurations.push(configuration);
            Ok(())
        })
    }

    /// Register course metadata and add the course to a catalog.
    pub fn insert_catalog_course(&self, catalog_id: u32, course: CatalogCourse) -> Result<(), RepositoryError> {
        self.write(|state| {
            let keys = state.catalogs.entry(catalog_id).or_default();
            if !keys.contains(&course.key) {
                keys.push(course.key.clone());
            }
            if let Some(existing) = state.courses.iter_mut().find(|known| known.key == course.key) {
                *existing = course;
            } else {
                state.courses.push(course);
            }
            Ok(())
        })
    }

    pub fn remove_catalog_course(&self, catalog_id: u32, course_key: &str) -> Result<(), RepositoryError> {
        self.write(|state| {
            if let Some(keys) = state.catalogs.get_mut(&catalog_id) {
                keys.retain(|key| key != course_key);
            }
            Ok(())
        })
    }

    pub fn insert_program(&self, program_id: impl Into<String>, course_keys: Vec<String>) -> Result<(), RepositoryError> {
        let program_id = program_id.into();
        self.write(|state| {
            state.programs.insert(program_id, course_keys);
            Ok(())
        })
    }

    pub fn insert_progress(&self, progress: LearnerProgress) -> Result<(), RepositoryError> {
        self.write(|state| {
            state.progress.retain(|known| {
                known.username != progress.username || known.course_id != progress.course_id
            });
            state.progress.push(progress);
            Ok(())
        })
    }

    fn course_metadata(state: &Snapshot, key: &str) -> CatalogCourse {
        state
            .courses
            .iter()
            .find(|course| course.key == key)
            .cloned()
            .unwrap_or_else(|| CatalogCourse::new(key, key))
    }
}

fn unavailable(path: &Path, err: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Unavailable(format!("{}: {}", path.display(), err))
}

fn persist(path: &Path, snapshot: &Snapshot) -> Result<(), RepositoryError> {
    let encoded = serde_json::to_vec_pretty(snapshot).map_err(|err| unavailable(path, err))?;
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    fs::write(&temp, encoded).map_err(|err| unavailable(&temp, err))?;
    fs::rename(&temp, path).map_err(|err| unavailable(path, err))?;
    debug!(path = %path.display(), "snapshot persisted");
    Ok(())
}

impl EnterpriseDirectory for SnapshotStore {
    fn customer(&self, uuid: &Uuid) -> Result<Option<EnterpriseCustomer>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.customers.iter().find(|customer| &customer.uuid == uuid).cloned())
    }

    fn user(&self, username: &str) -> Result<Option<PlatformUser>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.users.iter().find(|user| user.username == username).cloned())
    }

    fn enrollments_for(&self, customer: &Uuid) -> Result<Vec<EnterpriseCourseEnrollment>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .enrollments
            .iter()
            .filter(|enrollment| &enrollment.enterprise_customer_uuid == customer)
            .cloned()
            .collect())
    }
}

impl ConsentRepository for SnapshotStore {
    fn fetch(&self, key: &ConsentKey) -> Result<Option<ConsentRecord>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .consents
            .iter()
            .find(|record| &record.key() == key)
            .cloned()
            .map(ConsentRecord::materialized))
    }

    fn upsert(&self, record: ConsentRecord) -> Result<ConsentRecord, RepositoryError> {
        self.write(|state| {
            let key = record.key();
            match state.consents.iter_mut().find(|existing| existing.key() == key) {
                Some(existing) => existing.granted = record.granted,
                None => state.consents.push(record.clone()),
            }
            Ok(record.materialized())
        })
    }
}

impl ChannelConfigurationRepository for SnapshotStore {
    fn active_configurations(
        &self,
        kind: ChannelKind,
        customer: Option<&Uuid>,
    ) -> Result<Vec<ChannelConfiguration>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .channel_configurations
            .iter()
            .filter(|configuration| configuration.active && configuration.kind() == kind)
            .filter(|configuration| {
                customer.map_or(true, |uuid| &configuration.enterprise_customer_uuid == uuid)
            })
            .cloned()
            .collect())
    }
}

impl AuditRepository for SnapshotStore {
    fn catalog_audits(&self, customer: &Uuid) -> Result<Vec<CatalogTransmissionAudit>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .catalog_audits
            .iter()
            .filter(|audit| &audit.enterprise_customer_uuid == customer)
            .cloned()
            .collect())
    }

    fn record_catalog_audit(
        &self,
        audit: CatalogTransmissionAudit,
    ) -> Result<CatalogTransmissionAudit, RepositoryError> {
        self.write(|state| {
            state.catalog_audits.push(audit.clone());
            Ok(audit)
        })
    }

    fn learner_audits(
        &self,
        enterprise_course_enrollment_id: u64,
    ) -> Result<Vec<LearnerTransmissionAudit>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .learner_audits
            .iter()
            .filter(|audit| audit.record.enterprise_course_enrollment_id == enterprise_course_enrollment_id)
            .cloned()
            .collect())
    }

    fn record_learner_audit(
        &self,
        audit: LearnerTransmissionAudit,
    ) -> Result<LearnerTransmissionAudit, RepositoryError> {
        self.write(|state| {
            state.learner_audits.push(audit.clone());
            Ok(audit)
        })
    }
}

impl CatalogService for SnapshotStore {
    fn is_course_in_catalog(&self, catalog_id: u32, course_id: &str) -> Result<bool, CatalogError> {
        let state = self
            .lock()
            .map_err(|err| CatalogError::Unavailable(err.to_string()))?;
        Ok(state
            .catalogs
            .get(&catalog_id)
            .is_some_and(|keys| keys.iter().any(|key| key == course_id)))
    }

    fn get_search_results(&self, query: &SearchQuery) -> Result<Vec<CatalogCourse>, CatalogError> {
        let state = self
            .lock()
            .map_err(|err| CatalogError::Unavailable(err.to_string()))?;

        let keys: Vec<String> = if let Some(program) = query.get(SearchQuery::PROGRAM) {
            state.programs.get(program).cloned().unwrap_or_default()
        } else if let Some(raw) = query.get(SearchQuery::CATALOG_ID) {
            let catalog_id = raw
                .parse::<u32>()
                .map_err(|_| CatalogError::Malformed(format!("catalog id '{raw}'")))?;
            state.catalogs.get(&catalog_id).cloned().unwrap_or_default()
        } else {
            state.courses.iter().map(|course| course.key.clone()).collect()
        };

        Ok(keys
            .iter()
            .filter(|key| query.get(SearchQuery::KEY).map_or(true, |wanted| wanted == key.as_str()))
            .map(|key| Self::course_metadata(&state, key))
            .collect())
    }
}

impl LearnerProgressSource for SnapshotStore {
    fn progress(&self, username: &str, course_id: &str) -> Result<Option<LearnerProgress>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .progress
            .iter()
            .find(|progress| progress.username == username && progress.course_id == course_id)
            .cloned())
    }
}
