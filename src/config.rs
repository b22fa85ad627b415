//! Credential configuration for the recognition and generation providers.
//!
//! Credentials are explicit values handed to the pipeline per run. Nothing in
//! the library reads them from ambient state; the env-var loading here is a
//! convenience for the CLI entry point.

use serde::{Deserialize, Serialize};

/// API credentials for one pipeline run.
///
/// The recognition provider authenticates with an app id/key pair, the
/// generation provider with a bearer token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Mathpix `app_id` header value.
    #[serde(default)]
    pub mathpix_app_id: String,
    /// Mathpix `app_key` header value.
    #[serde(default)]
    pub mathpix_app_key: String,
    /// Groq bearer token.
    #[serde(default)]
    pub groq_api_key: String,
}

impl Credentials {
    /// Build credentials from environment variables.
    ///
    /// Supported env vars:
    /// - `MATHPIX_APP_ID`
    /// - `MATHPIX_APP_KEY`
    /// - `GROQ_API_KEY`
    ///
    /// Missing variables leave the field empty; validation happens when the
    /// pipeline run starts.
    pub fn from_env() -> Self {
        Self {
            mathpix_app_id: std::env::var("MATHPIX_APP_ID").unwrap_or_default(),
            mathpix_app_key: std::env::var("MATHPIX_APP_KEY").unwrap_or_default(),
            groq_api_key: std::env::var("GROQ_API_KEY").unwrap_or_default(),
        }
    }

    /// Names of required credential fields that are empty after trimming.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.mathpix_app_id.trim().is_empty() {
            missing.push("mathpix_app_id");
        }
        if self.mathpix_app_key.trim().is_empty() {
            missing.push("mathpix_app_key");
        }
        if self.groq_api_key.trim().is_empty() {
            missing.push("groq_api_key");
        }
        missing
    }

    /// True when all three required values are present.
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_credentials_are_incomplete() {
        let creds = Credentials::default();
        assert!(!creds.is_complete());
        assert_eq!(
            creds.missing_fields(),
            vec!["mathpix_app_id", "mathpix_app_key", "groq_api_key"]
        );
    }

    #[test]
    fn whitespace_only_values_count_as_missing() {
        let creds = Credentials {
            mathpix_app_id: "  ".to_string(),
            mathpix_app_key: "key".to_string(),
            groq_api_key: "gsk_test".to_string(),
        };
        assert_eq!(creds.missing_fields(), vec!["mathpix_app_id"]);
    }

    #[test]
    fn complete_credentials_validate() {
        let creds = Credentials {
            mathpix_app_id: "id".to_string(),
            mathpix_app_key: "key".to_string(),
            groq_api_key: "gsk_test".to_string(),
        };
        assert!(creds.is_complete());
    }
}
