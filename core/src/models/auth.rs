//! Payloads accepted by the session manager.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation::rules;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(custom(function = "rules::validate_email_format"))]
    pub email: String,
    #[validate(custom(function = "rules::validate_password_strength"))]
    pub password: String,
    #[validate(length(min = 1, max = 255))]
    pub full_name: String,
    #[validate(length(max = 100))]
    pub war_name: String,
}

#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(custom(function = "rules::validate_password_strength"))]
    pub new_password: String,
}
