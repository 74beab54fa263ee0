use super::{OTP_CODE_PATTERN, PHONE_PATTERN};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SendOtpForm {
    #[validate(regex(
        path = *PHONE_PATTERN,
        message = "Enter a valid Indonesian WhatsApp number, e.g. 081234567890"
    ))]
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct VerifyOtpForm {
    #[validate(regex(
        path = *PHONE_PATTERN,
        message = "Enter a valid Indonesian WhatsApp number, e.g. 081234567890"
    ))]
    pub phone: String,
    #[validate(regex(path = *OTP_CODE_PATTERN, message = "The code has 6 digits"))]
    pub code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_otp_rejects_short_number() {
        let form = SendOtpForm {
            phone: "12345".into(),
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("phone"));
    }

    #[test]
    fn test_send_otp_accepts_local_number() {
        let form = SendOtpForm {
            phone: "081234567890".into(),
        };
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_verify_otp_requires_six_digits() {
        let form = VerifyOtpForm {
            phone: "081234567890".into(),
            code: "12a456".into(),
        };
        assert!(form.validate().is_err());

        let form = VerifyOtpForm {
            phone: "081234567890".into(),
            code: "123456".into(),
        };
        assert!(form.validate().is_ok());
    }
}
