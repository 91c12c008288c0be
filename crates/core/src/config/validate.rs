use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates, after applying profile defaults:
/// - At least one worker
/// - min delay <= max delay
/// - Extraction timeout, checkpoint interval and status interval are non-zero
/// - Scorer rule resolves (custom thresholds within 0.0..=1.0)
/// - Extractor base URL and query parameter are set
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let orchestrator = &config.orchestrator;

    if orchestrator.resolved_workers() == 0 {
        return Err(invalid("orchestrator.workers must be at least 1"));
    }
    if orchestrator.checkpoint_interval_secs == 0 {
        return Err(invalid("orchestrator.checkpoint_interval_secs cannot be 0"));
    }
    if orchestrator.status_interval_secs == 0 {
        return Err(invalid("orchestrator.status_interval_secs cannot be 0"));
    }

    let pacing = config.pacing.resolve(&orchestrator.profile.pacing());
    if pacing.min_delay > pacing.max_delay {
        return Err(ConfigError::ValidationError(format!(
            "pacing.min_delay_ms ({}) exceeds pacing.max_delay_ms ({})",
            pacing.min_delay.as_millis(),
            pacing.max_delay.as_millis()
        )));
    }
    if pacing.extract_timeout.is_zero() {
        return Err(invalid("pacing.extract_timeout_secs cannot be 0"));
    }

    config
        .scorer
        .resolve_rule(orchestrator.profile.rule())
        .map_err(ConfigError::ValidationError)?;

    if config.extractor.base_url.trim().is_empty() {
        return Err(invalid("extractor.base_url cannot be empty"));
    }
    if config.extractor.query_param.trim().is_empty() {
        return Err(invalid("extractor.query_param cannot be empty"));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}
