use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Integrated channel types known to the transmission commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChannelKind {
    #[serde(rename = "SAP")]
    SapSuccessFactors,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 1] = [ChannelKind::SapSuccessFactors];

    pub fn code(self) -> &'static str {
        match self {
            ChannelKind::SapSuccessFactors => "SAP",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ChannelKind::SapSuccessFactors => "SAP SuccessFactors",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Channel code that matches no known channel, upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid integrated channel: {0}")]
pub struct UnknownChannel(pub String);

impl FromStr for ChannelKind {
    type Err = UnknownChannel;

    /// Channel codes are case-insensitive.
    fn from_str(code: &str) -> Result<Self, Self::Err> {
        let code = code.trim().to_uppercase();
        ChannelKind::ALL
            .into_iter()
            .find(|kind| kind.code() == code)
            .ok_or(UnknownChannel(code))
    }
}

/// Credentials for a SAP SuccessFactors tenant.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SapCredentials {
    pub base_url: String,
    pub company_id: String,
    pub user_id: String,
    pub key: String,
    pub secret: String,
}

impl fmt::Debug for SapCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SapCredentials")
            .field("base_url", &self.base_url)
            .field("company_id", &self.company_id)
            .field("user_id", &self.user_id)
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Channel-specific settings, tagged by channel code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel")]
pub enum ChannelCredentials {
    #[serde(rename = "SAP")]
    SapSuccessFactors(SapCredentials),
}

impl ChannelCredentials {
    pub fn kind(&self) -> ChannelKind {
        match self {
            ChannelCredentials::SapSuccessFactors(_) => ChannelKind::SapSuccessFactors,
        }
    }
}

/// One enterprise customer's configuration of one integrated channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfiguration {
    pub id: u64,
    pub enterprise_customer_uuid: Uuid,
    #[serde(default)]
    pub active: bool,
    pub credentials: ChannelCredentials,
}

impl ChannelConfiguration {
    pub fn kind(&self) -> ChannelKind {
        self.credentials.kind()
    }

    pub fn channel_code(&self) -> &'static str {
        self.kind().code()
    }
}

impl fmt::Display for ChannelConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} configuration {} for enterprise {}",
            self.kind().label(),
            self.id,
            self.enterprise_customer_uuid
        )
    }
}
