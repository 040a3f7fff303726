//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::SyncConfig;
use super::secret::secret_string;
use crate::domain::errors::SyncError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into SyncConfig
/// 4. Applies environment variable overrides (DHIS2SYNC_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - A referenced environment variable is not set
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use dhis2sync::config::loader::load_config;
///
/// let config = load_config("dhis2sync.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<SyncConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(SyncError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        SyncError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses configuration text, applying substitution, overrides and validation
///
/// # Errors
///
/// Same as [`load_config`], minus the file access errors.
pub fn parse_config(contents: &str) -> Result<SyncConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: SyncConfig = toml::from_str(&contents)
        .map_err(|e| SyncError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config);

    config.validate().map_err(|e| {
        SyncError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| SyncError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let processed = re.replace_all(line, |caps: &regex::Captures<'_>| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    String::new()
                }
            }
        });
        result.push_str(&processed);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(SyncError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using the DHIS2SYNC_* prefix
///
/// Variables follow the pattern DHIS2SYNC_<SECTION>_<KEY>, for example
/// DHIS2SYNC_IMPORT_CHUNK_SIZE. Profile credentials use
/// DHIS2SYNC_PROFILE_<ID>_<SOURCE|DESTINATION>_<KEY> with the id upper-cased.
fn apply_env_overrides(config: &mut SyncConfig) {
    if let Ok(val) = std::env::var("DHIS2SYNC_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // HTTP overrides
    if let Some(timeout) = env_parse("DHIS2SYNC_HTTP_TIMEOUT_SECONDS") {
        config.http.timeout_seconds = timeout;
    }
    if let Some(timeout) = env_parse("DHIS2SYNC_HTTP_DISCOVERY_TIMEOUT_SECONDS") {
        config.http.discovery_timeout_seconds = timeout;
    }
    if let Some(verify) = env_parse("DHIS2SYNC_HTTP_TLS_VERIFY") {
        config.http.tls_verify = verify;
    }
    if let Some(retries) = env_parse("DHIS2SYNC_HTTP_RETRY_MAX_RETRIES") {
        config.http.retry.max_retries = retries;
    }

    // Import overrides
    if let Some(size) = env_parse("DHIS2SYNC_IMPORT_CHUNK_SIZE") {
        config.import.chunk_size = size;
    }
    if let Some(polls) = env_parse("DHIS2SYNC_IMPORT_MAX_CONCURRENT_POLLS") {
        config.import.max_concurrent_polls = polls;
    }
    if let Some(interval) = env_parse("DHIS2SYNC_IMPORT_POLL_INTERVAL_MS") {
        config.import.poll_interval_ms = interval;
    }

    // Store overrides
    if let Ok(val) = std::env::var("DHIS2SYNC_STORE_BACKEND") {
        match toml::Value::String(val.to_lowercase()).try_into() {
            Ok(backend) => config.store.backend = backend,
            Err(_) => tracing::warn!(value = %val, "Ignoring invalid DHIS2SYNC_STORE_BACKEND"),
        }
    }
    if let Ok(val) = std::env::var("DHIS2SYNC_STORE_PATH") {
        config.store.path = val;
    }
    if let Some(ref mut pg) = config.store.postgresql {
        if let Ok(val) = std::env::var("DHIS2SYNC_STORE_POSTGRESQL_CONNECTION_STRING") {
            pg.connection_string = secret_string(val);
        }
    }

    // Profile credential overrides
    for profile in &mut config.profiles {
        let prefix = format!(
            "DHIS2SYNC_PROFILE_{}",
            profile.id.to_uppercase().replace(['-', ' ', '.'], "_")
        );
        for (side, instance) in [
            ("SOURCE", &mut profile.source),
            ("DESTINATION", &mut profile.destination),
        ] {
            if let Ok(val) = std::env::var(format!("{prefix}_{side}_BASE_URL")) {
                instance.base_url = val;
            }
            if let Ok(val) = std::env::var(format!("{prefix}_{side}_USERNAME")) {
                instance.username = val;
            }
            if let Ok(val) = std::env::var(format!("{prefix}_{side}_PASSWORD")) {
                instance.password = secret_string(val);
            }
        }
    }

    // Logging overrides
    if let Some(enabled) = env_parse("DHIS2SYNC_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = enabled;
    }
    if let Ok(val) = std::env::var("DHIS2SYNC_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
