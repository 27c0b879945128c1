//! SAP SuccessFactors client: OAuth client-credentials token acquisition
//! plus the OCN course import and learning-event completion endpoints.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::client::{ChannelClient, ChannelResponse, TransmissionError};
use super::configuration::SapCredentials;
use crate::config::SapApiPaths;

// Tokens are refreshed slightly before SuccessFactors expires them.
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'static str,
    company_id: &'a str,
    user_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now + EXPIRY_MARGIN < self.expires_at
    }
}

pub struct SuccessFactorsClient {
    credentials: SapCredentials,
    paths: SapApiPaths,
    agent: ureq::Agent,
    token: Mutex<Option<AccessToken>>,
}

impl SuccessFactorsClient {
    pub fn new(credentials: SapCredentials, paths: SapApiPaths) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            credentials,
            paths,
            agent,
            token: Mutex::new(None),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        join_url(&self.credentials.base_url, path)
    }

    fn access_token(&self) -> Result<String, TransmissionError> {
        let mut cached = self
            .token
            .lock()
            .map_err(|_| TransmissionError::Authentication("token cache poisoned".to_string()))?;

        if let Some(token) = cached.as_ref().filter(|token| token.is_fresh(Instant::now())) {
            return Ok(token.value.clone());
        }

        let token = self.request_token()?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    fn request_token(&self) -> Result<AccessToken, TransmissionError> {
        let url = self.endpoint(&self.paths.oauth_api_path);
        debug!(url = %url, company_id = %self.credentials.company_id, "requesting SuccessFactors access token");

        let body = TokenRequest {
            client_id: &self.credentials.key,
            client_secret: &self.credentials.secret,
            grant_type: "client_credentials",
            company_id: &self.credentials.company_id,
            user_id: &self.credentials.user_id,
        };

        let response = self
            .agent
            .post(&url)
            .send_json(&body)
            .map_err(|err| TransmissionError::Authentication(err.to_string()))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.into_body().read_to_string().unwrap_or_default();
            warn!(status, "SuccessFactors rejected the token request");
            return Err(TransmissionError::Authentication(format!(
                "token endpoint responded with status {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .into_body()
            .read_json()
            .map_err(|err| TransmissionError::Authentication(err.to_string()))?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(0));
        Ok(AccessToken {
            value: token.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }

    fn post_payload(&self, url: &str, payload: &str) -> Result<ChannelResponse, TransmissionError> {
        let token = self.access_token()?;
        let response = self
            .agent
            .post(url)
            .header("Authorization", &format!("Bearer {}", token))
            .header("Content-Type", "application/json")
            .send(payload)
            .map_err(|err| TransmissionError::Request(err.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .into_body()
            .read_to_string()
            .map_err(|err| TransmissionError::Request(err.to_string()))?;

        if (200..300).contains(&status) {
            Ok(ChannelResponse::new(status, body))
        } else {
            Err(TransmissionError::Status { status, body })
        }
    }
}

impl ChannelClient for SuccessFactorsClient {
    fn send_course_import(&self, payload: &str) -> Result<ChannelResponse, TransmissionError> {
        let url = self.endpoint(&self.paths.course_api_path);
        self.post_payload(&url, payload)
    }

    fn send_completion_status(
        &self,
        external_user_id: &str,
        payload: &str,
    ) -> Result<ChannelResponse, TransmissionError> {
        debug!(external_user_id, "sending completion status to SuccessFactors");
        let url = self.endpoint(&self.paths.completion_status_api_path);
        self.post_payload(&url, payload)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
