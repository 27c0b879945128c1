use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::store::RepositoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoursePacing {
    #[serde(rename = "self")]
    SelfPaced,
    #[serde(rename = "instructor")]
    InstructorPaced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub is_passing: bool,
    pub created: DateTime<Utc>,
}

/// Everything needed to decide whether a learner completed a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerProgress {
    pub username: String,
    pub course_id: String,
    pub pacing: CoursePacing,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub passed: bool,
    #[serde(default)]
    pub certificate: Option<CertificateRecord>,
}

/// Source of learner progress for completion reporting.
pub trait LearnerProgressSource: Send + Sync {
    fn progress(
        &self,
        username: &str,
        course_id: &str,
    ) -> Result<Option<LearnerProgress>, RepositoryError>;
}

#[derive(Debug)]
pub enum ProgressImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { line: u64, reason: String },
}

impl fmt::Display for ProgressImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressImportError::Io(err) => write!(f, "failed to read progress export: {}", err),
            ProgressImportError::Csv(err) => write!(f, "invalid progress CSV data: {}", err),
            ProgressImportError::InvalidRow { line, reason } => {
                write!(f, "invalid progress row on line {}: {}", line, reason)
            }
        }
    }
}

impl std::error::Error for ProgressImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProgressImportError::Io(err) => Some(err),
            ProgressImportError::Csv(err) => Some(err),
            ProgressImportError::InvalidRow { .. } => None,
        }
    }
}

impl From<std::io::Error> for ProgressImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ProgressImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Learner progress loaded from a grades/certificates CSV export.
///
/// Columns: `username`, `course_id`, `pacing` (`self` or `instructor`),
/// `end`, `passed`, `certificate_created`, `certificate_passing`. Dates are
/// RFC 3339 timestamps or `YYYY-MM-DD`.
#[derive(Debug, Clone, Default)]
pub struct CsvProgressSource {
    entries: HashMap<(String, String), LearnerProgress>,
}

impl CsvProgressSource {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ProgressImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ProgressImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut entries = HashMap::new();

        // Line 1 holds the headers.
        for (index, record) in csv_reader.deserialize::<ProgressRow>().enumerate() {
            let row = record?;
            let progress = row.into_progress(index as u64 + 2)?;
            entries.insert(
                (progress.username.clone(), progress.course_id.clone()),
                progress,
            );
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LearnerProgressSource for CsvProgressSource {
    fn progress(
        &self,
        username: &str,
        course_id: &str,
    ) -> Result<Option<LearnerProgress>, RepositoryError> {
        Ok(self
            .entries
            .get(&(username.to_string(), course_id.to_string()))
            .cloned())
    }
}

#[derive(Debug, Deserialize)]
struct ProgressRow {
    username: String,
    course_id: String,
    pacing: CoursePacing,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    end: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_false")]
    passed: bool,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    certificate_created: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_false")]
    certificate_passing: bool,
}

impl ProgressRow {
    fn into_progress(self, line: u64) -> Result<LearnerProgress, ProgressImportError> {
        let end = self
            .end
            .as_deref()
            .map(|raw| parse_timestamp(raw).ok_or_else(|| invalid(line, "end", raw)))
            .transpose()?;
        let certificate = self
            .certificate_created
            .as_deref()
            .map(|raw| {
                parse_timestamp(raw)
                    .map(|created| CertificateRecord {
                        is_passing: self.certificate_passing,
                        created,
                    })
                    .ok_or_else(|| invalid(line, "certificate_created", raw))
            })
            .transpose()?;

        Ok(LearnerProgress {
            username: self.username,
            course_id: self.course_id,
            pacing: self.pacing,
            end,
            passed: self.passed,
            certificate,
        })
    }
}

fn invalid(line: u64, column: &str, raw: &str) -> ProgressImportError {
    ProgressImportError::InvalidRow {
        line,
        reason: format!("unparseable {column} '{raw}'"),
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn empty_string_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "no" => Ok(false),
        "true" | "1" | "yes" => Ok(true),
        other => Err(serde::de::Error::custom(format!("expected a boolean, found '{other}'"))),
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
