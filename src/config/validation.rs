use crate::config::schema::{AppConfig, BridgeSettings};
use crate::error::{CrebassError, Result};

/// Upper bound for `settling_delay_ms`.
const MAX_SETTLING_DELAY_MS: u64 = 10_000;

/// Validate the whole configuration
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.automation.prog_id.trim().is_empty() {
        return Err(CrebassError::Validation(
            "Automation prog_id cannot be empty".to_string(),
        ));
    }

    if let Some(url) = &config.start_url {
        validate_start_url(url)?;
    }

    for path in &config.bootstrap {
        if path.as_os_str().is_empty() {
            return Err(CrebassError::Validation(
                "Bootstrap script path cannot be empty".to_string(),
            ));
        }
    }

    validate_bridge_settings(&config.bridge)
}

/// Validate the start URL scheme
pub fn validate_start_url(url: &str) -> Result<()> {
    const SCHEMES: [&str; 4] = ["http://", "https://", "file://", "about:"];
    if !SCHEMES.iter().any(|s| url.starts_with(s)) {
        return Err(CrebassError::Validation(format!(
            "Invalid start URL: {}. Must start with http://, https://, file:// or about:",
            url
        )));
    }
    Ok(())
}

pub fn validate_bridge_settings(settings: &BridgeSettings) -> Result<()> {
    if settings.settling_delay_ms > MAX_SETTLING_DELAY_MS {
        return Err(CrebassError::Validation(format!(
            "settling_delay_ms {} exceeds {}",
            settings.settling_delay_ms, MAX_SETTLING_DELAY_MS
        )));
    }

    if settings.console_rearm_ms == 0 {
        return Err(CrebassError::Validation(
            "console_rearm_ms must be greater than zero".to_string(),
        ));
    }

    if settings.bootstrap_timeout_ms == Some(0) {
        return Err(CrebassError::Validation(
            "bootstrap_timeout_ms must be greater than zero when set".to_string(),
        ));
    }

    Ok(())
}
