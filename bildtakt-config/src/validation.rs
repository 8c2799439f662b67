//! Custom validation functions for configuration.

use validator::ValidationError;

/// Validate that a log level is one `tracing` understands.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid = ["trace", "debug", "info", "warn", "error", "off"]
        .contains(&level.to_lowercase().as_str());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_levels_in_any_case() {
        assert!(validate_log_level("INFO").is_ok());
        assert!(validate_log_level("trace").is_ok());
        assert!(validate_log_level("verbose").is_err());
    }
}
