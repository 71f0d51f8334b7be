//! Format predicates and password strength rules.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use validator::ValidationError;

/// Checks a dotted-quad IPv4 address: four decimal octets, each 0-255.
pub fn is_valid_ip(value: &str) -> bool {
    let octets: Vec<&str> = value.split('.').collect();
    if octets.len() != 4 {
        return false;
    }

    octets.iter().all(|octet| {
        !octet.is_empty()
            && octet.len() <= 3
            && octet.chars().all(|c| c.is_ascii_digit())
            && octet.parse::<u16>().map(|n| n <= 255).unwrap_or(false)
    })
}

/// Checks a MAC address written as six hex pairs separated by `:` or `-`.
///
/// Separators must be consistent; `AA:BB-CC:DD:EE:FF` is rejected.
pub fn is_valid_mac(value: &str) -> bool {
    let separator = if value.contains(':') { ':' } else { '-' };
    let groups: Vec<&str> = value.split(separator).collect();

    groups.len() == 6
        && groups
            .iter()
            .all(|group| group.len() == 2 && group.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Checks that an email has a single `@` with non-empty local and domain parts.
pub fn is_valid_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = value.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => !local.is_empty() && !domain.is_empty(),
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 6,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
        }
    }
}

impl PasswordPolicy {
    pub fn with_min_length(min_length: usize) -> Self {
        Self {
            min_length,
            ..Self::default()
        }
    }

    /// Evaluates `password`, listing violations in a fixed order:
    /// length, uppercase, lowercase, digit.
    pub fn check(&self, password: &str) -> PasswordValidation {
        let mut errors = Vec::new();

        if password.chars().count() < self.min_length {
            errors.push(format!(
                "A senha deve ter pelo menos {} caracteres",
                self.min_length
            ));
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            errors.push("A senha deve conter pelo menos uma letra maiúscula".to_string());
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            errors.push("A senha deve conter pelo menos uma letra minúscula".to_string());
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            errors.push("A senha deve conter pelo menos um número".to_string());
        }

        PasswordValidation {
            valid: errors.is_empty(),
            errors,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Validates a password against the default policy.
pub fn validate_password(password: &str) -> PasswordValidation {
    PasswordPolicy::default().check(password)
}

/// `validator` rule wrapping [`validate_password`].
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let result = validate_password(password);
    if result.valid {
        return Ok(());
    }
    let mut error = ValidationError::new("password_too_weak");
    error.message = Some(Cow::Owned(result.errors.join("; ")));
    Err(error)
}

/// `validator` rule wrapping [`is_valid_email`].
pub fn validate_email_format(email: &str) -> Result<(), ValidationError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(ValidationError::new("email_invalid_format"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_accepts_dotted_quad() {
        assert!(is_valid_ip("192.168.1.1"));
        assert!(is_valid_ip("0.0.0.0"));
        assert!(is_valid_ip("255.255.255.255"));
    }

    #[test]
    fn ip_rejects_out_of_range_and_malformed() {
        assert!(!is_valid_ip("256.1.1.1"));
        assert!(!is_valid_ip("192.168.1"));
        assert!(!is_valid_ip("192.168.1.1.1"));
        assert!(!is_valid_ip("192.168..1"));
        assert!(!is_valid_ip("192.168.1.a"));
        assert!(!is_valid_ip("+1.2.3.4"));
        assert!(!is_valid_ip("0001.2.3.4"));
        assert!(!is_valid_ip(""));
    }

    #[test]
    fn mac_accepts_colon_and_hyphen() {
        assert!(is_valid_mac("AA:BB:CC:DD:EE:FF"));
        assert!(is_valid_mac("aa-bb-cc-dd-ee-ff"));
        assert!(is_valid_mac("01:23:45:67:89:ab"));
    }

    #[test]
    fn mac_rejects_unseparated_and_mixed() {
        assert!(!is_valid_mac("AABBCCDDEEFF"));
        assert!(!is_valid_mac("AA:BB-CC:DD:EE:FF"));
        assert!(!is_valid_mac("AA:BB:CC:DD:EE"));
        assert!(!is_valid_mac("AA:BB:CC:DD:EE:GG"));
        assert!(!is_valid_mac("AAA:BB:CC:DD:EE:F"));
    }

    #[test]
    fn email_requires_single_at_with_both_parts() {
        assert!(is_valid_email("silva@x.com"));
        assert!(!is_valid_email("silva"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("silva@"));
        assert!(!is_valid_email("a@b@c"));
        assert!(!is_valid_email("si lva@x.com"));
    }

    #[test]
    fn short_password_lists_length_uppercase_and_digit() {
        let result = validate_password("abc");
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 3);
        assert!(result.errors[0].contains("6 caracteres"));
        assert!(result.errors[1].contains("maiúscula"));
        assert!(result.errors[2].contains("número"));
    }

    #[test]
    fn strong_password_is_valid() {
        let result = validate_password("Abcdef1");
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn policy_min_length_is_configurable() {
        let policy = PasswordPolicy::with_min_length(10);
        assert!(!policy.check("Abcdef1").valid);
        assert!(policy.check("Abcdefghi1").valid);
    }

    #[test]
    fn validator_rule_reports_code_and_message() {
        let err = validate_password_strength("abc").unwrap_err();
        assert_eq!(err.code, "password_too_weak");
        assert!(err.message.is_some());
        assert!(validate_password_strength("Abcdef1").is_ok());
    }
}
