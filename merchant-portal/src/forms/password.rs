use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[validate(schema(function = "validate_password_change", skip_on_field_errors = false))]
pub struct ChangePasswordForm {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 8, message = "New password must be at least 8 characters"))]
    pub new_password: String,
    pub confirm_password: String,
}

fn validate_password_change(form: &ChangePasswordForm) -> Result<(), ValidationError> {
    if form.new_password == form.current_password {
        let mut err = ValidationError::new("password_unchanged");
        err.message = Some("New password must differ from the current one".into());
        return Err(err);
    }
    if form.confirm_password != form.new_password {
        let mut err = ValidationError::new("password_mismatch");
        err.message = Some("Password confirmation does not match".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(current: &str, new: &str, confirm: &str) -> ChangePasswordForm {
        ChangePasswordForm {
            current_password: current.into(),
            new_password: new.into(),
            confirm_password: confirm.into(),
        }
    }

    #[test]
    fn test_rejects_short_password() {
        assert!(form("oldpassword", "short", "short").validate().is_err());
    }

    #[test]
    fn test_rejects_unchanged_password() {
        assert!(form("samepassword", "samepassword", "samepassword")
            .validate()
            .is_err());
    }

    #[test]
    fn test_rejects_mismatched_confirmation() {
        assert!(form("oldpassword", "newpassword1", "newpassword2")
            .validate()
            .is_err());
    }

    #[test]
    fn test_accepts_valid_change() {
        assert!(form("oldpassword", "newpassword1", "newpassword1")
            .validate()
            .is_ok());
    }
}
