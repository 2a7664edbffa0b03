use crate::utils::error::{EtlError, Result};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(EtlError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

fn collection_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_-]{0,63}$").expect("collection name pattern is valid")
    })
}

/// Database and collection names double as file and table names.
pub fn validate_collection_name(field_name: &str, name: &str) -> Result<()> {
    if !collection_name_pattern().is_match(name) {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: name.to_string(),
            reason: "Use 1-64 letters, digits, '_' or '-'".to_string(),
        });
    }
    Ok(())
}

// 以下兩個用於單筆寫入：回傳 ValidationError 而非設定錯誤

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(EtlError::validation(
            field_name,
            "Value cannot be empty or whitespace-only",
        ));
    }
    Ok(())
}

pub fn validate_non_negative(field_name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(EtlError::validation(
            field_name,
            format!("Value must be a non-negative number, got {}", value),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("source.endpoint", "https://example.com").is_ok());
        assert!(validate_url("source.endpoint", "http://example.com").is_ok());
        assert!(validate_url("source.endpoint", "").is_err());
        assert!(validate_url("source.endpoint", "invalid-url").is_err());
        assert!(validate_url("source.endpoint", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("timeout_seconds", 5, 1).is_ok());
        assert!(validate_positive_number("timeout_seconds", 0, 1).is_err());
    }

    #[test]
    fn test_validate_collection_name() {
        assert!(validate_collection_name("target", "market_cap_clean").is_ok());
        assert!(validate_collection_name("target", "memes-top-100").is_ok());
        assert!(validate_collection_name("target", "").is_err());
        assert!(validate_collection_name("target", "../etc").is_err());
        assert!(validate_collection_name("target", "a\"b").is_err());
    }

    #[test]
    fn test_mutation_field_checks() {
        assert!(validate_non_empty_string("nom", "Bitcoin").is_ok());
        assert!(matches!(
            validate_non_empty_string("nom", "   "),
            Err(EtlError::ValidationError { .. })
        ));
        assert!(validate_non_negative("prix_usd", 0.0).is_ok());
        assert!(validate_non_negative("prix_usd", -0.5).is_err());
        assert!(validate_non_negative("prix_usd", f64::NAN).is_err());
    }
}
