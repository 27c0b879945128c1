use chrono::{DateTime, Utc};
use tracing::debug;

use super::progress::{CoursePacing, LearnerProgress, LearnerProgressSource};
use crate::channels::audit::{Grade, LearnerDataRecord};
use crate::consent::ConsentPolicyEngine;
use crate::enterprise::{EnterpriseCourseEnrollment, EnterpriseCustomer, EnterpriseDirectory};
use crate::store::RepositoryError;

/// Completion state derived from learner progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub completed: bool,
    pub timestamp: Option<DateTime<Utc>>,
    pub grade: Grade,
}

/// Instructor-paced courses complete with a certificate. Self-paced courses
/// complete at their end date, or as soon as the learner passes when the
/// course has not ended.
pub fn completion_from_progress(progress: &LearnerProgress, now: DateTime<Utc>) -> Completion {
    match progress.pacing {
        CoursePacing::InstructorPaced => match &progress.certificate {
            Some(certificate) => Completion {
                completed: certificate.is_passing,
                timestamp: Some(certificate.created),
                grade: Grade::from_passing(certificate.is_passing),
            },
            None => in_progress(),
        },
        CoursePacing::SelfPaced => match progress.end {
            Some(end) if end < now => Completion {
                completed: progress.passed,
                timestamp: Some(end),
                grade: Grade::from_passing(progress.passed),
            },
            _ if progress.passed => Completion {
                completed: true,
                timestamp: Some(now),
                grade: Grade::Pass,
            },
            _ => in_progress(),
        },
    }
}

fn in_progress() -> Completion {
    Completion {
        completed: false,
        timestamp: None,
        grade: Grade::InProgress,
    }
}

/// Records produced by one learner export, plus how many enrollments were
/// deliberately left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LearnerExport {
    pub records: Vec<LearnerDataRecord>,
    pub skipped: usize,
}

/// Builds completion records for a customer's enrollments.
pub struct LearnerExporter<'a> {
    customer: &'a EnterpriseCustomer,
    directory: &'a dyn EnterpriseDirectory,
    consent: &'a ConsentPolicyEngine,
    progress: &'a dyn LearnerProgressSource,
    provider_id: &'a str,
    now: DateTime<Utc>,
}

impl<'a> LearnerExporter<'a> {
    pub fn new(
        customer: &'a EnterpriseCustomer,
        directory: &'a dyn EnterpriseDirectory,
        consent: &'a ConsentPolicyEngine,
        progress: &'a dyn LearnerProgressSource,
        provider_id: &'a str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            customer,
            directory,
            consent,
            progress,
            provider_id,
            now,
        }
    }

    /// One pending record per enrollment that should be reported. Each call
    /// re-reads enrollments and progress.
    pub fn collect_learner_data(&self) -> Result<LearnerExport, RepositoryError> {
        let mut export = LearnerExport::default();

        for enrollment in self.directory.enrollments_for(&self.customer.uuid)? {
            match self.record_for(&enrollment)? {
                Some(record) => export.records.push(record),
                None => export.skipped += 1,
            }
        }

        Ok(export)
    }

    fn record_for(
        &self,
        enrollment: &EnterpriseCourseEnrollment,
    ) -> Result<Option<LearnerDataRecord>, RepositoryError> {
        let provided = self.consent.consent_provided(
            &enrollment.username,
            &enrollment.course_id,
            &self.customer.uuid,
        )?;
        if !provided {
            debug!(enrollment_id = enrollment.id, "skipping enrollment without data sharing consent");
            return Ok(None);
        }

        if enrollment.audit_reporting_disabled(self.customer) {
            debug!(
                enrollment_id = enrollment.id,
                mode = %enrollment.mode,
                "skipping audit enrollment"
            );
            return Ok(None);
        }

        let Some(external_user_id) = enrollment.remote_user_id.clone() else {
            debug!(enrollment_id = enrollment.id, "skipping enrollment without a remote learner id");
            return Ok(None);
        };

        let Some(progress) = self
            .progress
            .progress(&enrollment.username, &enrollment.course_id)?
        else {
            debug!(
                enrollment_id = enrollment.id,
                course_id = %enrollment.course_id,
                "skipping enrollment without progress"
            );
            return Ok(None);
        };

        let completion = completion_from_progress(&progress, self.now);
        Ok(Some(LearnerDataRecord {
            enterprise_course_enrollment_id: enrollment.id,
            external_user_id,
            course_id: enrollment.course_id.clone(),
            course_completed: completion.completed,
            completed_timestamp: completion.timestamp.map(|at| at.timestamp_millis()),
            grade: completion.grade,
            provider_id: self.provider_id.to_string(),
        }))
    }
}
