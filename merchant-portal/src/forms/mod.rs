//! Page forms. Each form validates before anything is sent to the backend.

pub mod otp;
pub mod password;
pub mod profile;

use once_cell::sync::Lazy;
use regex::Regex;

pub use otp::{SendOtpForm, VerifyOtpForm};
pub use password::ChangePasswordForm;
pub use profile::UpdateProfileForm;

/// Indonesian mobile number: +62, 62 or 0 followed by 9–12 digits.
pub static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\+62|62|0)[0-9]{9,12}$").unwrap());

pub static OTP_CODE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{6}$").unwrap());

/// Rewrite an accepted phone number to the `62…` form the messaging channel expects.
pub fn normalize_phone(phone: &str) -> String {
    let trimmed = phone.trim();
    if let Some(rest) = trimmed.strip_prefix("+62") {
        format!("62{}", rest)
    } else if let Some(rest) = trimmed.strip_prefix('0') {
        format!("62{}", rest)
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_pattern() {
        assert!(PHONE_PATTERN.is_match("081234567890"));
        assert!(PHONE_PATTERN.is_match("+6281234567890"));
        assert!(PHONE_PATTERN.is_match("62812345678"));
        assert!(!PHONE_PATTERN.is_match("6281234567"));
        assert!(!PHONE_PATTERN.is_match("12345"));
        assert!(!PHONE_PATTERN.is_match("08123"));
        assert!(!PHONE_PATTERN.is_match("0812345678901234"));
        assert!(!PHONE_PATTERN.is_match("0812-3456-7890"));
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("081234567890"), "6281234567890");
        assert_eq!(normalize_phone("+6281234567890"), "6281234567890");
        assert_eq!(normalize_phone("6281234567890"), "6281234567890");
    }
}
