use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::catalog::{CatalogCourse, CatalogError, CatalogService, SearchQuery};
use crate::channels::audit::{AuditEntry, AuditSummary, CourseStatus};
use crate::config::ChannelSettings;
use crate::enterprise::EnterpriseCustomer;

/// End date reported for courses that never close.
pub const OPEN_ENDED_MILLIS: i64 = 2_147_483_647_000;
const LOCALE: &str = "English";
const LAUNCH_TYPE_URL: u8 = 3;
const REVISION_NUMBER: u32 = 1;

#[derive(Debug, Serialize)]
struct CourseImport<'a> {
    #[serde(rename = "ocnCourses")]
    ocn_courses: &'a [OcnCourse],
}

#[derive(Debug, Clone, Serialize)]
struct OcnCourse {
    content: Vec<OcnContent>,
    #[serde(rename = "courseID")]
    course_id: String,
    description: Vec<LocalizedText>,
    price: Vec<Value>,
    #[serde(rename = "providerID")]
    provider_id: String,
    #[serde(rename = "revisionNumber")]
    revision_number: u32,
    schedule: Vec<OcnSchedule>,
    status: &'static str,
    #[serde(rename = "thumbnailURI")]
    thumbnail_uri: String,
    title: Vec<LocalizedText>,
}

#[derive(Debug, Clone, Serialize)]
struct OcnContent {
    #[serde(rename = "contentID")]
    content_id: String,
    #[serde(rename = "contentTitle")]
    content_title: String,
    #[serde(rename = "launchType")]
    launch_type: u8,
    #[serde(rename = "launchURL")]
    launch_url: String,
    #[serde(rename = "mobileEnabled")]
    mobile_enabled: bool,
    #[serde(rename = "providerID")]
    provider_id: String,
}

#[derive(Debug, Clone, Serialize)]
struct LocalizedText {
    locale: &'static str,
    value: String,
}

impl LocalizedText {
    fn english(value: impl Into<String>) -> Vec<Self> {
        vec![Self {
            locale: LOCALE,
            value: value.into(),
        }]
    }
}

#[derive(Debug, Clone, Serialize)]
struct OcnSchedule {
    active: bool,
    #[serde(rename = "endDate")]
    end_date: i64,
    #[serde(rename = "startDate")]
    start_date: i64,
}

/// One serialized course import request and the number of courses in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlock {
    pub payload: String,
    pub item_count: usize,
}

/// Builds SuccessFactors course import payloads from a customer's catalog.
pub struct CourseExporter<'a> {
    customer: &'a EnterpriseCustomer,
    settings: &'a ChannelSettings,
    courses: Vec<CatalogCourse>,
    removed: BTreeSet<String>,
    now: DateTime<Utc>,
}

impl<'a> CourseExporter<'a> {
    /// Fetch the customer's catalog. Customers without a catalog export nothing.
    pub fn new(
        customer: &'a EnterpriseCustomer,
        catalog: &dyn CatalogService,
        settings: &'a ChannelSettings,
        now: DateTime<Utc>,
    ) -> Result<Self, CatalogError> {
        info!(enterprise = %customer.name, "retrieving course list for enterprise");
        let courses = match customer.catalog {
            Some(catalog_id) => catalog.get_search_results(&SearchQuery::catalog_course_runs(catalog_id))?,
            None => Vec::new(),
        };

        Ok(Self::from_courses(customer, settings, courses, now))
    }

    pub fn from_courses(
        customer: &'a EnterpriseCustomer,
        settings: &'a ChannelSettings,
        courses: Vec<CatalogCourse>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            customer,
            settings,
            courses,
            removed: BTreeSet::new(),
            now,
        }
    }

    pub fn courses(&self) -> &[CatalogCourse] {
        &self.courses
    }

    /// Courses the previous summary reported in the catalog that are gone now.
    /// They are sent as inactive in the next blocks.
    pub fn resolve_removed_courses(&mut self, previous: &AuditSummary) -> BTreeSet<String> {
        let current: BTreeSet<&str> = self.courses.iter().map(|course| course.key.as_str()).collect();
        self.removed = previous
            .iter()
            .filter(|(course_id, entry)| entry.in_catalog && !current.contains(course_id.as_str()))
            .map(|(course_id, _)| course_id.clone())
            .collect();

        if !self.removed.is_empty() {
            info!(
                enterprise = %self.customer.name,
                removed = self.removed.len(),
                "courses removed from catalog since the last transmission"
            );
        }
        self.removed.clone()
    }

    /// Course imports in batches of the configured size. Each call starts over.
    pub fn get_serialized_data_blocks(&self) -> Result<Vec<DataBlock>, serde_json::Error> {
        let records = self.course_records();
        let batch_size = self.settings.course_batch_size.max(1);

        records
            .chunks(batch_size)
            .map(|chunk| {
                let payload = serde_json::to_string(&CourseImport { ocn_courses: chunk })?;
                Ok(DataBlock {
                    payload,
                    item_count: chunk.len(),
                })
            })
            .collect()
    }

    /// What this export reports for each course, to compare against next time.
    pub fn audit_summary(&self) -> AuditSummary {
        let active = self.courses.iter().map(|course| {
            (
                course.key.clone(),
                AuditEntry {
                    in_catalog: true,
                    status: CourseStatus::Active,
                },
            )
        });
        let removed = self.removed.iter().map(|course_id| {
            (
                course_id.clone(),
                AuditEntry {
                    in_catalog: false,
                    status: CourseStatus::Inactive,
                },
            )
        });
        active.chain(removed).collect()
    }

    fn course_records(&self) -> Vec<OcnCourse> {
        let active = self.courses.iter().map(|course| {
            debug!(course_id = %course.key, "processing course");
            self.course_record(course, CourseStatus::Active)
        });
        let removed = self.removed.iter().map(|course_id| {
            let placeholder = CatalogCourse::new(course_id.clone(), course_id.clone());
            self.course_record(&placeholder, CourseStatus::Inactive)
        });
        active.chain(removed).collect()
    }

    fn course_record(&self, course: &CatalogCourse, status: CourseStatus) -> OcnCourse {
        let description = course
            .short_description
            .clone()
            .or_else(|| course.full_description.clone())
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| course.title.clone());

        OcnCourse {
            content: vec![OcnContent {
                content_id: course.key.clone(),
                content_title: course.title.clone(),
                launch_type: LAUNCH_TYPE_URL,
                launch_url: self.launch_url(&course.key),
                mobile_enabled: course.mobile_available,
                provider_id: self.settings.provider_id.clone(),
            }],
            course_id: course.key.clone(),
            description: LocalizedText::english(description),
            price: Vec::new(),
            provider_id: self.settings.provider_id.clone(),
            revision_number: REVISION_NUMBER,
            schedule: vec![OcnSchedule {
                active: status == CourseStatus::Active,
                end_date: course
                    .end
                    .map(|end| end.timestamp_millis())
                    .unwrap_or(OPEN_ENDED_MILLIS),
                start_date: course.start.unwrap_or(self.now).timestamp_millis(),
            }],
            status: status.as_str(),
            thumbnail_uri: course.image_url.clone().unwrap_or_default(),
            title: LocalizedText::english(course.title.clone()),
        }
    }

    fn launch_url(&self, course_key: &str) -> String {
        format!(
            "{}/enterprise/{}/course/{}/enroll/",
            self.settings.lms_root_url.trim_end_matches('/'),
            self.customer.uuid,
            course_key
        )
    }
}
