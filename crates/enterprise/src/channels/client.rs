use super::configuration::{ChannelConfiguration, ChannelCredentials};
use super::sap::SuccessFactorsClient;
use crate::config::ChannelSettings;

/// Status code and raw body returned by a channel endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelResponse {
    pub status: u16,
    pub body: String,
}

impl ChannelResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// A failed request to an integrated channel. Transmitters turn these into
/// failed audits; they never abort a run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransmissionError {
    #[error("{0}")]
    Request(String),
    #[error("channel responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("channel authentication failed: {0}")]
    Authentication(String),
    #[error("malformed channel payload: {0}")]
    Malformed(String),
}

/// Outbound calls every integrated channel supports.
pub trait ChannelClient: Send + Sync {
    fn send_course_import(&self, payload: &str) -> Result<ChannelResponse, TransmissionError>;
    fn send_completion_status(
        &self,
        external_user_id: &str,
        payload: &str,
    ) -> Result<ChannelResponse, TransmissionError>;
}

/// Builds the client matching a configuration's channel.
pub trait ChannelClientFactory: Send + Sync {
    fn client_for(
        &self,
        configuration: &ChannelConfiguration,
    ) -> Result<Box<dyn ChannelClient>, TransmissionError>;
}

/// Factory producing the HTTP clients for each channel kind.
#[derive(Debug, Clone)]
pub struct HttpChannelClients {
    settings: ChannelSettings,
}

impl HttpChannelClients {
    pub fn new(settings: ChannelSettings) -> Self {
        Self { settings }
    }
}

impl ChannelClientFactory for HttpChannelClients {
    fn client_for(
        &self,
        configuration: &ChannelConfiguration,
    ) -> Result<Box<dyn ChannelClient>, TransmissionError> {
        match &configuration.credentials {
            ChannelCredentials::SapSuccessFactors(credentials) => Ok(Box::new(
                SuccessFactorsClient::new(credentials.clone(), self.settings.sap.clone()),
            )),
        }
    }
}
