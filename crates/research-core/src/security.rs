use std::env;

use crate::ResearchError;

/// Wrapper around sensitive values to reduce accidental logging.
#[derive(Clone)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "***redacted***")
    }
}

/// API credential resolved from the environment, remembering which variable it came from.
#[derive(Debug, Clone)]
pub struct Credential {
    pub env_var: String,
    pub value: Option<SecretValue>,
}

impl Credential {
    /// Look up `var`; blank values count as absent.
    pub fn from_env(var: &str) -> Self {
        let value = match env::var(var) {
            Ok(value) if !value.trim().is_empty() => Some(SecretValue(value)),
            _ => None,
        };
        Self {
            env_var: var.to_string(),
            value,
        }
    }

    pub fn present(env_var: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
            value: Some(SecretValue::new(value)),
        }
    }

    pub fn absent(env_var: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
            value: None,
        }
    }

    /// Fail with `MissingCredential` when no value was found.
    pub fn require(&self) -> Result<&SecretValue, ResearchError> {
        self.value
            .as_ref()
            .ok_or_else(|| ResearchError::MissingCredential {
                env_var: self.env_var.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_from_env_success() {
        unsafe { std::env::set_var("TAVILY_TEST_SECRET", "value") };
        let credential = Credential::from_env("TAVILY_TEST_SECRET");
        assert_eq!(credential.require().expect("secret should load").expose(), "value");
    }

    #[test]
    fn credential_missing() {
        unsafe { std::env::remove_var("TAVILY_TEST_SECRET_MISSING") };
        let credential = Credential::from_env("TAVILY_TEST_SECRET_MISSING");
        let err = credential.require().unwrap_err();
        assert!(matches!(
            err,
            ResearchError::MissingCredential { ref env_var } if env_var == "TAVILY_TEST_SECRET_MISSING"
        ));
    }

    #[test]
    fn blank_credential_counts_as_missing() {
        unsafe { std::env::set_var("TAVILY_TEST_SECRET_BLANK", "   ") };
        assert!(Credential::from_env("TAVILY_TEST_SECRET_BLANK").value.is_none());
    }

    #[test]
    fn debug_output_is_redacted() {
        let secret = SecretValue::new("tvly-abc123");
        assert_eq!(format!("{secret:?}"), "***redacted***");
    }
}
