use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::cache::{CacheKey, ResponseCache};
use super::{CatalogCourse, CatalogError, CatalogService, SearchQuery};

/// Blocking client for the course discovery (catalog) API.
///
/// Responses are memoized in the injected [`ResponseCache`], keyed by the
/// resource and its query parameters.
pub struct CatalogApiClient {
    base_url: String,
    api_token: Option<String>,
    agent: ureq::Agent,
    cache: Arc<ResponseCache>,
}

#[derive(Debug, Deserialize)]
struct ContainsResponse {
    #[serde(default)]
    courses: BTreeMap<String, bool>,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    next: Option<String>,
}

impl CatalogApiClient {
    const CONTAINS_RESOURCE: &'static str = "catalogs.contains";
    const SEARCH_RESOURCE: &'static str = "search.all";

    pub fn new(base_url: impl Into<String>, api_token: Option<String>, cache: Arc<ResponseCache>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
            agent: ureq::Agent::new_with_defaults(),
            cache,
        }
    }

    fn get_json(&self, url: &str, params: &[(&str, &str)]) -> Result<Value, CatalogError> {
        let mut request = self.agent.get(url);
        for (name, value) in params {
            request = request.query(*name, *value);
        }
        if let Some(token) = &self.api_token {
            request = request.header("Authorization", &format!("JWT {}", token));
        }

        let response = request
            .call()
            .map_err(|err| CatalogError::Unavailable(err.to_string()))?;

        response
            .into_body()
            .read_json::<Value>()
            .map_err(|err| CatalogError::Malformed(err.to_string()))
    }

    fn fetch_all_pages(&self, query: &SearchQuery) -> Result<Value, CatalogError> {
        let params: Vec<(&str, &str)> = query.params().collect();
        let first_url = format!("{}/search/all/", self.base_url);

        let mut page = parse_page(self.get_json(&first_url, &params)?)?;
        let mut results = std::mem::take(&mut page.results);
        while let Some(next) = page.next.take() {
            debug!(url = %next, "following catalog search pagination");
            page = parse_page(self.get_json(&next, &[])?)?;
            results.append(&mut page.results);
        }

        Ok(Value::Array(results))
    }
}

fn parse_page(value: Value) -> Result<SearchPage, CatalogError> {
    serde_json::from_value(value).map_err(|err| CatalogError::Malformed(err.to_string()))
}

impl CatalogService for CatalogApiClient {
    fn is_course_in_catalog(&self, catalog_id: u32, course_id: &str) -> Result<bool, CatalogError> {
        let catalog = catalog_id.to_string();
        let key = CacheKey::new(
            Self::CONTAINS_RESOURCE,
            [("catalog_id", catalog.as_str()), ("course_run_id", course_id)],
        );

        let value = self.cache.get_or_try_insert(key, || {
            let url = format!("{}/catalogs/{}/contains/", self.base_url, catalog_id);
            self.get_json(&url, &[("course_run_id", course_id)])
        })?;

        let contains: ContainsResponse =
            serde_json::from_value(value).map_err(|err| CatalogError::Malformed(err.to_string()))?;
        Ok(contains.courses.get(course_id).copied().unwrap_or(false))
    }

    fn get_search_results(&self, query: &SearchQuery) -> Result<Vec<CatalogCourse>, CatalogError> {
        let key = CacheKey::new(Self::SEARCH_RESOURCE, query.params());
        let value = self
            .cache
            .get_or_try_insert(key, || self.fetch_all_pages(query))?;

        serde_json::from_value(value).map_err(|err| CatalogError::Malformed(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn unreachable_client(cache: Arc<ResponseCache>) -> CatalogApiClient {
        // Port 9 (discard) on loopback is never served in test environments.
        CatalogApiClient::new("http://127.0.0.1:9/api/v1/", None, cache)
    }

    #[test]
    fn cached_membership_answers_without_network() {
        let cache = Arc::new(ResponseCache::new(Duration::from_secs(60)));
        cache.set(
            CacheKey::new(
                CatalogApiClient::CONTAINS_RESOURCE,
                [("catalog_id", "1"), ("course_run_id", "course-v1:X+1")],
            ),
            json!({ "courses": { "course-v1:X+1": true } }),
        );

        let client = unreachable_client(cache);
        assert!(client
            .is_course_in_catalog(1, "course-v1:X+1")
            .expect("served from cache"));
    }

    #[test]
    fn cached_search_results_deserialize_into_courses() {
        let cache = Arc::new(ResponseCache::new(Duration::from_secs(60)));
        let query = SearchQuery::catalog_course_runs(1);
        cache.set(
            CacheKey::new(CatalogApiClient::SEARCH_RESOURCE, query.params()),
            json!([{ "key": "course-v1:X+1", "title": "Demo" }]),
        );

        let client = unreachable_client(cache);
        let courses = client.get_search_results(&query).expect("served from cache");
        assert_eq!(courses, vec![CatalogCourse::new("course-v1:X+1", "Demo")]);
    }

    #[test]
    fn unreachable_service_reports_unavailable() {
        let cache = Arc::new(ResponseCache::new(Duration::from_secs(60)));
        let client = unreachable_client(cache);
        let err = client
            .is_course_in_catalog(1, "course-v1:X+1")
            .expect_err("nothing listens on the discard port");
        assert!(matches!(err, CatalogError::Unavailable(_)));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = unreachable_client(Arc::new(ResponseCache::new(Duration::ZERO)));
        assert_eq!(client.base_url, "http://127.0.0.1:9/api/v1");
    }
}
