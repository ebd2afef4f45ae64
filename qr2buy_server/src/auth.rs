//! Credential checks for the admin basic-auth gate.
use sha2::{Digest, Sha256};

use crate::config::AdminAuthConfig;

/// Check an `Authorization` header value against the configured admin credentials.
///
/// A configuration without usable credentials rejects everything; the gate fails closed rather than open.
pub fn check_basic_auth(header: Option<&str>, config: &AdminAuthConfig) -> bool {
    if !config.is_usable() {
        return false;
    }
    let Some((user, pass)) = parse_basic_header(header) else {
        return false;
    };
    // Compare digests so that the comparison time does not depend on the supplied credentials.
    constant_time_compare(&user, &config.username) & constant_time_compare(&pass, config.password.reveal())
}

fn parse_basic_header(header: Option<&str>) -> Option<(String, String)> {
    let header = header?;
    let (scheme, encoded) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = base64::decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

fn constant_time_compare(supplied: &str, expected: &str) -> bool {
    let a = Sha256::digest(supplied.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod test {
    use super::*;

    fn header_for(user: &str, pass: &str) -> String {
        format!("Basic {}", base64::encode(format!("{user}:{pass}")))
    }

    #[test]
    fn accepts_correct_credentials() {
        let config = AdminAuthConfig::new("admin", "hunter2");
        assert!(check_basic_auth(Some(&header_for("admin", "hunter2")), &config));
    }

    #[test]
    fn rejects_wrong_or_missing_credentials() {
        let config = AdminAuthConfig::new("admin", "hunter2");
        assert!(!check_basic_auth(Some(&header_for("admin", "wrong")), &config));
        assert!(!check_basic_auth(Some(&header_for("other", "hunter2")), &config));
        assert!(!check_basic_auth(Some("Bearer abc"), &config));
        assert!(!check_basic_auth(Some("Basic not-base64!!"), &config));
        assert!(!check_basic_auth(None, &config));
    }

    #[test]
    fn unconfigured_gate_fails_closed() {
        let config = AdminAuthConfig::default();
        assert!(!check_basic_auth(Some(&header_for("", "")), &config));
        assert!(!check_basic_auth(Some("Basic Og=="), &config));
    }
}
