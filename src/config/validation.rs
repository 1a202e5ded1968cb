use std::time::Duration;

use url::Url;

use super::ConfigError;

/// Ensures `value` parses as a URL with one of `schemes`.
pub(super) fn validate_url(key: &str, value: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{value:?} is not a valid URL: {e}"),
    })?;

    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!(
                "scheme {:?} not allowed, expected one of {}",
                url.scheme(),
                schemes.join(", ")
            ),
        });
    }

    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{value:?} cannot be used as a base URL"),
        });
    }

    Ok(())
}

pub(super) fn validate_timeout(key: &str, value: Duration) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be greater than 0".to_string(),
        });
    }
    Ok(())
}
