//! Payload builders for integrated channels.

pub mod courses;
pub mod learner;
pub mod progress;

pub use courses::{CourseExporter, DataBlock, OPEN_ENDED_MILLIS};
pub use learner::{completion_from_progress, Completion, LearnerExport, LearnerExporter};
pub use progress::{
    CertificateRecord, CoursePacing, CsvProgressSource, LearnerProgress, LearnerProgressSource,
    ProgressImportError,
};
