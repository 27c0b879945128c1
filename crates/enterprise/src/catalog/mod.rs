//! Access to the external content-catalog service.

pub mod cache;
pub mod client;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use cache::{CacheKey, ResponseCache};
pub use client::CatalogApiClient;

/// Course run metadata as returned by catalog searches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCourse {
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub full_description: Option<String>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub mobile_available: bool,
}

impl CatalogCourse {
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            short_description: None,
            full_description: None,
            start: None,
            end: None,
            image_url: None,
            mobile_available: false,
        }
    }
}

/// Search filter passed through to the catalog service as query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    params: BTreeMap<String, String>,
}

impl SearchQuery {
    pub const CATALOG_ID: &'static str = "catalog_id";
    pub const PROGRAM: &'static str = "program";
    pub const CONTENT_TYPE: &'static str = "content_type";
    pub const KEY: &'static str = "key";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Every course run in a customer's catalog.
    pub fn catalog_course_runs(catalog_id: u32) -> Self {
        Self::new()
            .with(Self::CATALOG_ID, catalog_id.to_string())
            .with(Self::CONTENT_TYPE, "courserun")
    }

    /// Every course run belonging to a program.
    pub fn program_course_runs(program_id: &str) -> Self {
        Self::new()
            .with(Self::PROGRAM, program_id)
            .with(Self::CONTENT_TYPE, "courserun")
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Parameters in a stable (sorted) order.
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog service unavailable: {0}")]
    Unavailable(String),
    #[error("malformed catalog response: {0}")]
    Malformed(String),
}

/// The two query shapes the core depends on.
pub trait CatalogService: Send + Sync {
    fn is_course_in_catalog(&self, catalog_id: u32, course_id: &str) -> Result<bool, CatalogError>;
    fn get_search_results(&self, query: &SearchQuery) -> Result<Vec<CatalogCourse>, CatalogError>;
}

/// Course keys of a program, in catalog order.
pub fn program_course_keys(
    catalog: &dyn CatalogService,
    program_id: &str,
) -> Result<Vec<String>, CatalogError> {
    let courses = catalog.get_search_results(&SearchQuery::program_course_runs(program_id))?;
    Ok(courses.into_iter().map(|course| course.key).collect())
}
