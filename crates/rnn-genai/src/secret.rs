//! Redacting wrapper for API keys and tokens.
//!
//! Backed by `secrecy::SecretBox` so the value is zeroized on drop and never
//! shows up in `Debug`/`Display` output, logs, or error messages.

use secrecy::{ExposeSecret, SecretBox};
use std::fmt;

/// A credential that is only readable through [`Secret::expose`].
pub struct Secret(SecretBox<str>);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(Box::from(value.into().as_str())))
    }

    /// Read the underlying value. Call only at the point of use.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Read an optional secret from the environment, ignoring blank values.
    pub fn from_env(var: &str) -> Option<Self> {
        std::env::var(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(Self::new)
    }
}

impl Clone for Secret {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for Secret {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Secret {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_redacted_in_debug_and_display() {
        let secret = Secret::new("ghp_super_secret");
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
        assert_eq!(format!("{secret}"), "[REDACTED]");
    }

    #[test]
    fn test_expose_and_clone() {
        let secret = Secret::from("sk-test");
        let copy = secret.clone();
        assert_eq!(copy.expose(), "sk-test");
    }
}
