//! Profile-based client construction
//!
//! A transfer names a profile; the connector turns it into a pair of
//! ready-to-use platform clients.

use super::api::PlatformApi;
use super::client::Dhis2Client;
use crate::config::{HttpConfig, ProfileConfig};
use crate::domain::{Result, SyncError};
use async_trait::async_trait;
use std::sync::Arc;

/// Source and destination clients for one transfer
#[derive(Clone)]
pub struct PlatformPair {
    pub source: Arc<dyn PlatformApi>,
    pub destination: Arc<dyn PlatformApi>,
}

/// Resolves a connection profile into platform clients
#[async_trait]
pub trait PlatformConnector: Send + Sync {
    /// Builds both clients for `profile_id`
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Configuration` for an unknown profile and
    /// `SyncError::Platform` if a client cannot be constructed.
    async fn connect(&self, profile_id: &str) -> Result<PlatformPair>;
}

/// Connector backed by the configured `[[profiles]]`
pub struct ProfileConnector {
    profiles: Vec<ProfileConfig>,
    http: HttpConfig,
}

impl ProfileConnector {
    pub fn new(profiles: Vec<ProfileConfig>, http: HttpConfig) -> Self {
        Self { profiles, http }
    }

    fn profile(&self, id: &str) -> Result<&ProfileConfig> {
        self.profiles.iter().find(|p| p.id == id).ok_or_else(|| {
            let known: Vec<&str> = self.profiles.iter().map(|p| p.id.as_str()).collect();
            SyncError::Configuration(format!(
                "Unknown connection profile '{id}'. Configured profiles: {}",
                known.join(", ")
            ))
        })
    }
}

#[async_trait]
impl PlatformConnector for ProfileConnector {
    async fn connect(&self, profile_id: &str) -> Result<PlatformPair> {
        let profile = self.profile(profile_id)?;

        let source = Dhis2Client::new(&profile.source, &self.http)?;
        let destination = Dhis2Client::new(&profile.destination, &self.http)?;

        tracing::debug!(
            profile = profile_id,
            source = source.base_url(),
            destination = destination.base_url(),
            "Platform clients ready"
        );

        Ok(PlatformPair {
            source: Arc::new(source),
            destination: Arc::new(destination),
        })
    }
}
