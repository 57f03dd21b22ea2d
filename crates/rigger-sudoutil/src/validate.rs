//! Input validation for rigger-sudoutil.
//!
//! All validation is pure (no side effects) and fully testable. Every
//! function returns Ok(()) or Err(String) with a human-readable message.
//! The helper runs as root via sudo, so everything reaching a system
//! command must pass through here first.

/// Maximum username length (Linux limit is 32).
pub const USERNAME_MAX_LEN: usize = 32;

/// Systemd user units the helper may start on behalf of an account.
pub const ALLOWED_UNITS: &[&str] = &["docker.service", "podman.socket"];

/// Validate a username naming a hosted account.
///
/// Rules:
/// - Non-empty, max 32 characters
/// - Starts with a lowercase letter or underscore
/// - Only lowercase ascii, digits, underscore, hyphen
pub fn validate_username(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("username is empty".into());
    }
    if name.len() > USERNAME_MAX_LEN {
        return Err(format!(
            "username too long ({} > {USERNAME_MAX_LEN})",
            name.len()
        ));
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap_or('\0');
    if !(first.is_ascii_lowercase() || first == '_') {
        return Err("username must start with a lowercase letter or underscore".into());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err("username contains invalid characters (allowed: a-z, 0-9, _, -)".into());
    }
    Ok(())
}

/// Validate a systemd user-unit name against the allowlist.
pub fn validate_unit(unit: &str) -> Result<(), String> {
    if ALLOWED_UNITS.contains(&unit) {
        Ok(())
    } else {
        Err(format!("unit '{unit}' not in allowlist"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_usernames() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("web_user-01").is_ok());
        assert!(validate_username("_svc").is_ok());
    }

    #[test]
    fn test_invalid_usernames() {
        assert!(validate_username("").is_err());
        assert!(validate_username("Alice").is_err());
        assert!(validate_username("9lives").is_err());
        assert!(validate_username("al ice").is_err());
        assert!(validate_username("a;rm -rf /").is_err());
        assert!(validate_username("../etc").is_err());
        assert!(validate_username(&"a".repeat(33)).is_err());
    }

    #[test]
    fn test_unit_allowlist() {
        assert!(validate_unit("docker.service").is_ok());
        assert!(validate_unit("sshd.service").is_err());
        assert!(validate_unit("docker.service; reboot").is_err());
    }
}
