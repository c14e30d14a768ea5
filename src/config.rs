//! Configuration loading and startup readiness validation.

use crate::error::{ConfigError, Result};

/// Default listen port when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 10000;

/// Bridge configuration.
///
/// Every credential is optional at load time. [`Config::readiness`] reports
/// which capabilities are usable; missing groups degrade to warn-and-skip at
/// runtime rather than failing startup.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Dify API key for the chat-messages endpoint.
    pub dify_api_key: Option<String>,

    /// Chatfuel broadcast credentials.
    pub chatfuel: ChatfuelConfig,

    /// HTTP listen port.
    pub port: u16,
}

/// Chatfuel broadcast configuration.
#[derive(Debug, Clone, Default)]
pub struct ChatfuelConfig {
    /// Bot identifier in the broadcast URL path.
    pub bot_id: Option<String>,

    /// API token passed as a query parameter.
    pub token: Option<String>,

    /// Default block that renders the pushed answer.
    pub answer_block_id: Option<String>,
}

impl ChatfuelConfig {
    /// All three credentials present.
    pub fn is_complete(&self) -> bool {
        self.bot_id.is_some() && self.token.is_some() && self.answer_block_id.is_some()
    }
}

/// Startup readiness report: which capabilities are available and which
/// environment variables are missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    /// Turns can be sent to Dify.
    pub upstream: bool,

    /// Answers can be pushed back through Chatfuel.
    pub delivery: bool,

    /// Environment variables that were not set.
    pub missing: Vec<&'static str>,
}

impl Readiness {
    /// Fully configured: every capability available.
    pub fn is_full(&self) -> bool {
        self.upstream && self.delivery
    }
}

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid(format!("PORT is not a valid port: {raw}")))?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self {
            dify_api_key: env_nonempty("DIFY_API_KEY"),
            chatfuel: ChatfuelConfig {
                bot_id: env_nonempty("CHATFUEL_BOT_ID"),
                token: env_nonempty("CHATFUEL_TOKEN"),
                answer_block_id: env_nonempty("CHATFUEL_ANSWER_BLOCK_ID"),
            },
            port,
        })
    }

    /// Validate the loaded configuration into a structured readiness report.
    pub fn readiness(&self) -> Readiness {
        let mut missing = Vec::new();
        if self.dify_api_key.is_none() {
            missing.push("DIFY_API_KEY");
        }
        if self.chatfuel.bot_id.is_none() {
            missing.push("CHATFUEL_BOT_ID");
        }
        if self.chatfuel.token.is_none() {
            missing.push("CHATFUEL_TOKEN");
        }
        if self.chatfuel.answer_block_id.is_none() {
            missing.push("CHATFUEL_ANSWER_BLOCK_ID");
        }

        Readiness {
            upstream: self.dify_api_key.is_some(),
            delivery: self.chatfuel.is_complete(),
            missing,
        }
    }
}

/// Read an environment variable, treating empty values as unset.
fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
