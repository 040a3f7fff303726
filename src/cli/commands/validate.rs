//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the dhis2sync configuration file and, optionally, every profile's
//! connectivity.

use super::{EXIT_CONFIG, EXIT_CONNECTION, EXIT_SUCCESS};
use crate::adapters::dhis2::{Dhis2Client, PlatformApi};
use crate::config::schema::{HttpConfig, InstanceConfig, StoreBackend};
use crate::config::load_config;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Also authenticate against every source and destination instance
    #[arg(long)]
    pub check_connections: bool,
}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("Validating configuration file: {config_path}");
        println!();

        // load_config validates before returning
        let config = match load_config(config_path) {
            Ok(c) => {
                println!("Configuration is valid");
                c
            }
            Err(e) => {
                println!("Configuration validation failed");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  HTTP Timeout: {}s", config.http.timeout_seconds);
        println!("  Discovery Timeout: {}s", config.http.discovery_timeout_seconds);
        println!("  TLS Verify: {}", config.http.tls_verify);
        println!("  Import Chunk Size: {}", config.import.chunk_size);
        println!("  Concurrent Job Polls: {}", config.import.max_concurrent_polls);
        match config.store.backend {
            StoreBackend::Memory => println!("  Progress Store: memory"),
            StoreBackend::File => println!("  Progress Store: file ({})", config.store.path),
            StoreBackend::PostgreSQL => {
                if let Some(pg_config) = &config.store.postgresql {
                    use secrecy::ExposeSecret;
                    println!(
                        "  Progress Store: postgresql ({})",
                        pg_config
                            .connection_string
                            .expose_secret()
                            .as_ref()
                            .split('@')
                            .next_back()
                            .unwrap_or("***")
                    );
                }
            }
        }
        println!("  Profiles:");
        for profile in &config.profiles {
            let name = if profile.name.is_empty() { &profile.id } else { &profile.name };
            println!(
                "    {} ({}): {} -> {}",
                profile.id, name, profile.source.base_url, profile.destination.base_url
            );
        }
        println!();

        if !self.check_connections {
            return Ok(EXIT_SUCCESS);
        }

        println!("Checking connections:");
        let mut failures = 0usize;
        for profile in &config.profiles {
            for (role, instance) in [("source", &profile.source), ("destination", &profile.destination)] {
                match check_connection(instance, &config.http).await {
                    Ok(version) => {
                        println!("  [ok]   {}/{role}: DHIS2 {version}", profile.id);
                    }
                    Err(e) => {
                        failures += 1;
                        tracing::warn!(profile = %profile.id, role = role, error = %e, "Connection check failed");
                        println!("  [fail] {}/{role}: {e}", profile.id);
                    }
                }
            }
        }
        println!();

        if failures > 0 {
            println!("{failures} connection check(s) failed");
            return Ok(EXIT_CONNECTION);
        }
        println!("All connections succeeded");
        Ok(EXIT_SUCCESS)
    }
}

/// Authenticates against one instance and returns its version
async fn check_connection(instance: &InstanceConfig, http: &HttpConfig) -> anyhow::Result<String> {
    let client = Dhis2Client::new(instance, http)?;
    let info = client.system_info().await?;
    Ok(info.version)
}
