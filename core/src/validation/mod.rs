//! Input sanitization and validation.
//!
//! Pure helpers for cleaning user-supplied strings and checking the formats
//! the panel accepts (IP, MAC, email, password strength). Request payloads
//! derive [`Validate`] and reuse the rules from [`rules`].

pub mod rules;
pub mod sanitize;

pub use rules::{
    is_valid_email, is_valid_ip, is_valid_mac, validate_password, PasswordPolicy,
    PasswordValidation,
};
pub use sanitize::{detect_suspicious_input, sanitize_input};
pub use validator::Validate;
