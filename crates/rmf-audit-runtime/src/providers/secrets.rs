//! API keys for model providers.
//!
//! Keys never come from audit or runtime config files: they are passed in
//! explicitly or read from the environment, and are held as
//! [`secrecy::SecretString`] until a request header is built.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use super::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Explicit,
    Environment,
}

/// A provider key that prints as `[REDACTED]`.
pub struct ApiKey {
    secret: SecretString,
    source: KeySource,
}

impl ApiKey {
    pub fn explicit(key: impl Into<String>) -> Self {
        Self {
            secret: SecretString::from(key.into()),
            source: KeySource::Explicit,
        }
    }

    /// An unset or blank variable is reported as not configured.
    pub fn from_env(var: &str) -> Result<Self, ProviderError> {
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(Self {
                secret: SecretString::from(key),
                source: KeySource::Environment,
            }),
            _ => Err(ProviderError::NotConfigured(format!(
                "set {} to enable assisted evaluation",
                var
            ))),
        }
    }

    pub fn resolve(explicit: Option<&str>, var: &str) -> Result<Self, ProviderError> {
        match explicit {
            Some(key) => Ok(Self::explicit(key)),
            None => Self::from_env(var),
        }
    }

    /// Only for building the request header.
    pub fn expose(&self) -> &str {
        self.secret.expose_secret()
    }

    pub fn is_blank(&self) -> bool {
        self.secret.expose_secret().trim().is_empty()
    }

    pub fn source(&self) -> KeySource {
        self.source
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey({:?}, [REDACTED])", self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNSET: &str = "RMF_AUDIT_TEST_KEY_THAT_IS_NEVER_SET";

    #[test]
    fn test_debug_redacts() {
        let key = ApiKey::explicit("sk-test-very-secret-123");
        let debug = format!("{:?}", key);
        assert_eq!(debug, "ApiKey(Explicit, [REDACTED])");
        assert_eq!(key.expose(), "sk-test-very-secret-123");
    }

    #[test]
    fn test_explicit_key_wins() {
        let key = ApiKey::resolve(Some("from-caller"), UNSET).unwrap();
        assert_eq!(key.source(), KeySource::Explicit);
    }

    #[test]
    fn test_unset_variable_is_not_configured() {
        let err = ApiKey::resolve(None, UNSET).unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
        assert!(err.to_string().contains(UNSET));
    }

    #[test]
    fn test_blank_detection() {
        assert!(ApiKey::explicit("  ").is_blank());
        assert!(!ApiKey::explicit("k").is_blank());
    }
}
