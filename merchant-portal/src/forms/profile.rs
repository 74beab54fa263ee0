use super::PHONE_PATTERN;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct UpdateProfileForm {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[validate(regex(
        path = *PHONE_PATTERN,
        message = "Enter a valid Indonesian phone number"
    ))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}
