use sha2::{Digest, Sha256};

pub const PASSWORD_HEADER: &str = "X-Webhook-Password";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Header matched the configured secret.
    Allow,
    /// No secret configured; the endpoint is open.
    Unprotected,
    Deny,
}

/// Compares the `X-Webhook-Password` header against the configured secret.
#[derive(Clone)]
pub struct AuthGate {
    secret_digest: Option<[u8; 32]>,
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("protected", &self.secret_digest.is_some())
            .finish()
    }
}

impl AuthGate {
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            secret_digest: secret.filter(|s| !s.is_empty()).map(digest),
        }
    }

    pub fn is_protected(&self) -> bool {
        self.secret_digest.is_some()
    }

    pub fn check(&self, provided: Option<&str>) -> AuthOutcome {
        let Some(expected) = &self.secret_digest else {
            return AuthOutcome::Unprotected;
        };

        match provided {
            Some(value) if constant_time_eq(&digest(value), expected) => AuthOutcome::Allow,
            _ => AuthOutcome::Deny,
        }
    }
}

/// Both sides are hashed first so the comparison length never depends on the secret.
fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_header_is_allowed() {
        let gate = AuthGate::new(Some("secret"));
        assert_eq!(gate.check(Some("secret")), AuthOutcome::Allow);
    }

    #[test]
    fn test_wrong_or_missing_header_is_denied() {
        let gate = AuthGate::new(Some("secret"));
        assert_eq!(gate.check(Some("Secret")), AuthOutcome::Deny);
        assert_eq!(gate.check(Some("secret ")), AuthOutcome::Deny);
        assert_eq!(gate.check(Some("")), AuthOutcome::Deny);
        assert_eq!(gate.check(None), AuthOutcome::Deny);
    }

    #[test]
    fn test_whitespace_secret_is_enforced() {
        let gate = AuthGate::new(Some("   "));
        assert!(gate.is_protected());
        assert_eq!(gate.check(None), AuthOutcome::Deny);
        assert_eq!(gate.check(Some("   ")), AuthOutcome::Allow);
    }

    #[test]
    fn test_no_secret_disables_gate() {
        for gate in [AuthGate::new(None), AuthGate::new(Some(""))] {
            assert!(!gate.is_protected());
            assert_eq!(gate.check(None), AuthOutcome::Unprotected);
            assert_eq!(gate.check(Some("anything")), AuthOutcome::Unprotected);
        }
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let rendered = format!("{:?}", AuthGate::new(Some("hunter2")));
        assert!(!rendered.contains("hunter2"));
    }
}
