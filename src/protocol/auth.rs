//! Basic authentication credentials

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Login/password pair attached to a caster request.
///
/// A default `Authenticator` carries no credentials and produces no
/// `Authorization` header.
#[derive(Debug, Clone, Default)]
pub struct Authenticator {
    login: String,
    password: String,
    authenticated: bool,
}

impl Authenticator {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
            authenticated: true,
        }
    }

    /// Whether credentials have been supplied
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Base64 of `login:password`
    pub fn basic(&self) -> String {
        BASE64.encode(format!("{}:{}", self.login, self.password))
    }

    /// Value for the `Authorization` header, if credentials are set
    pub fn authorization(&self) -> Option<String> {
        self.authenticated.then(|| format!("Basic {}", self.basic()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_produces_no_header() {
        let auth = Authenticator::default();
        assert!(!auth.is_authenticated());
        assert!(auth.authorization().is_none());
    }

    #[test]
    fn test_basic_encoding() {
        let auth = Authenticator::new("user", "pass");
        assert!(auth.is_authenticated());
        assert_eq!(auth.basic(), "dXNlcjpwYXNz");
        assert_eq!(auth.authorization().as_deref(), Some("Basic dXNlcjpwYXNz"));
    }

    #[test]
    fn test_empty_login_still_authenticates() {
        let auth = Authenticator::new("", "secret");
        assert!(auth.is_authenticated());
        assert_eq!(auth.basic(), BASE64.encode(":secret"));
    }
}
