use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status recorded when a transmission attempt fails before the channel answers.
pub const FAILURE_STATUS: &str = "500";

/// Status recorded when a catalog run had no course blocks to send.
pub const NO_CONTENT_STATUS: &str = "204";

/// Catalog status of a course as last reported to a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CourseStatus {
    Active,
    Inactive,
}

impl CourseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CourseStatus::Active => "ACTIVE",
            CourseStatus::Inactive => "INACTIVE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub in_catalog: bool,
    pub status: CourseStatus,
}

/// Course id to what the last catalog transmission said about it.
pub type AuditSummary = BTreeMap<String, AuditEntry>;

/// Outcome of one catalog transmission for one channel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTransmissionAudit {
    pub channel_configuration_id: u64,
    pub enterprise_customer_uuid: Uuid,
    pub total_courses: usize,
    pub status: String,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub audit_summary: AuditSummary,
    pub created: DateTime<Utc>,
}

impl CatalogTransmissionAudit {
    pub fn is_successful(&self) -> bool {
        transmission_succeeded(&self.status, &self.error_message)
    }
}

fn transmission_succeeded(status: &str, error_message: &str) -> bool {
    error_message.is_empty() && status != FAILURE_STATUS
}

/// Learner grade as reported to channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    Pass,
    Fail,
    #[serde(rename = "In Progress")]
    InProgress,
}

impl Grade {
    pub fn label(self) -> &'static str {
        match self {
            Grade::Pass => "Pass",
            Grade::Fail => "Fail",
            Grade::InProgress => "In Progress",
        }
    }

    pub fn from_passing(passing: bool) -> Self {
        if passing {
            Grade::Pass
        } else {
            Grade::Fail
        }
    }
}

/// A learner completion record waiting to be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerDataRecord {
    pub enterprise_course_enrollment_id: u64,
    pub external_user_id: String,
    pub course_id: String,
    pub course_completed: bool,
    /// Epoch milliseconds.
    pub completed_timestamp: Option<i64>,
    pub grade: Grade,
    pub provider_id: String,
}

#[derive(Serialize)]
struct CompletionPayload<'a> {
    #[serde(rename = "completedTimestamp")]
    completed_timestamp: Option<i64>,
    #[serde(rename = "courseCompleted")]
    course_completed: &'static str,
    #[serde(rename = "courseID")]
    course_id: &'a str,
    grade: &'static str,
    #[serde(rename = "providerID")]
    provider_id: &'a str,
    #[serde(rename = "userID")]
    user_id: &'a str,
}

impl LearnerDataRecord {
    /// Completion wire payload. Keys are emitted in alphabetical order.
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&CompletionPayload {
            completed_timestamp: self.completed_timestamp,
            course_completed: if self.course_completed { "true" } else { "false" },
            course_id: &self.course_id,
            grade: self.grade.label(),
            provider_id: &self.provider_id,
            user_id: &self.external_user_id,
        })
    }
}

/// Persisted outcome of one learner completion transmission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerTransmissionAudit {
    #[serde(flatten)]
    pub record: LearnerDataRecord,
    pub status: String,
    #[serde(default)]
    pub error_message: String,
    pub created: DateTime<Utc>,
}

impl LearnerTransmissionAudit {
    pub fn is_successful(&self) -> bool {
        transmission_succeeded(&self.status, &self.error_message)
    }

    /// A completed, successful send is never repeated for the same enrollment,
    /// even when the learner's grade changes afterwards.
    pub fn suppresses_resend(&self) -> bool {
        self.record.course_completed && self.is_successful()
    }
}
