//! Client configuration.

use std::time::Duration;

use crate::error::ClientError;

/// Configuration for a [`Client`](crate::Client).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Deadline for every correlated request.
    /// Default: 30 seconds
    pub request_timeout: Duration,

    /// Request a full cache refresh for every newly sighted appliance.
    /// Default: true
    pub refresh_on_add: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            refresh_on_add: true,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_refresh_on_add(mut self, refresh: bool) -> Self {
        self.refresh_on_add = refresh;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.request_timeout == Duration::ZERO {
            return Err(ClientError::Configuration(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
