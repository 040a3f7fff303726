//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use super::{EXIT_CONFIG, EXIT_FATAL, EXIT_SUCCESS};
use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "dhis2sync.toml")]
    pub output: String,

    /// Include every tuning section with its default values
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        if Path::new(&self.output).exists() && !self.force {
            println!("Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(EXIT_CONFIG);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your instance URLs", self.output);
                println!("  2. Create a .env file with the credentials it references:");
                println!("     DHIS2_SOURCE_USERNAME, DHIS2_SOURCE_PASSWORD,");
                println!("     DHIS2_DEST_USERNAME, DHIS2_DEST_PASSWORD");
                println!("  3. Validate configuration: dhis2sync validate-config --check-connections");
                println!("  4. Run a transfer: dhis2sync transfer --request request.toml");
                println!();
                Ok(EXIT_SUCCESS)
            }
            Err(e) => {
                println!("Failed to write configuration file");
                println!("   Error: {e}");
                Ok(EXIT_FATAL)
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# dhis2sync configuration
# Aggregate data transfer between DHIS2 instances

[application]
log_level = "info"

[store]
backend = "file"
path = "./progress"

[[profiles]]
id = "default"
name = "Source to destination"

[profiles.source]
base_url = "https://source.example.org"
username = "${DHIS2_SOURCE_USERNAME}"
password = "${DHIS2_SOURCE_PASSWORD}"

[profiles.destination]
base_url = "https://destination.example.org"
username = "${DHIS2_DEST_USERNAME}"
password = "${DHIS2_DEST_PASSWORD}"

[logging]
local_enabled = false
"#
        .to_string()
    }

    /// Generate configuration with every section spelled out
    fn generate_config_with_examples() -> String {
        r#"# dhis2sync configuration
# Aggregate data transfer between DHIS2 instances
#
# Values of the form ${VAR} are read from the environment (or a .env file).
# Any key can also be overridden with DHIS2SYNC_<SECTION>_<KEY>, for example
# DHIS2SYNC_IMPORT_CHUNK_SIZE=500.

[application]
# trace, debug, info, warn, error
log_level = "info"

[http]
# Per-request timeout; destination imports can be slow
timeout_seconds = 600
connect_timeout_seconds = 30
# Timeout for the descendant-inclusive org unit discovery query
discovery_timeout_seconds = 180
tls_verify = true

[http.retry]
# Retries on 429, 5xx and connection errors
max_retries = 3
initial_delay_ms = 500
max_delay_ms = 2000
backoff_multiplier = 2.0

[import]
# Values per async import job
chunk_size = 1000
# Jobs polled at the same time
max_concurrent_polls = 10
poll_interval_ms = 2000
max_poll_attempts = 300
# Retries of a single failed status poll
poll_retry_attempts = 1000
poll_retry_initial_delay_ms = 2000
poll_retry_max_delay_ms = 30000
# Submission attempts per chunk (quadratic backoff)
submit_attempts = 3
submit_base_delay_ms = 500

[store]
# memory, file or postgresql
backend = "file"
path = "./progress"

# [store.postgresql]
# connection_string = "${DHIS2SYNC_PG_CONNECTION}"
# max_connections = 5
# connection_timeout_seconds = 30

[[profiles]]
id = "default"
name = "Source to destination"

[profiles.source]
base_url = "https://source.example.org"
username = "${DHIS2_SOURCE_USERNAME}"
password = "${DHIS2_SOURCE_PASSWORD}"

[profiles.destination]
base_url = "https://destination.example.org"
username = "${DHIS2_DEST_USERNAME}"
password = "${DHIS2_DEST_PASSWORD}"

[logging]
local_enabled = true
local_path = "./logs"
# daily, hourly or never
local_rotation = "daily"
local_max_size_mb = 100
"#
        .to_string()
    }
}
