use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Profile {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub whatsapp_verified: bool,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Profile {
    pub fn initials(&self) -> String {
        let initials: String = self
            .name
            .split_whitespace()
            .filter_map(|part| part.chars().next())
            .take(2)
            .collect::<String>()
            .to_uppercase();

        if initials.is_empty() {
            "U".to_string()
        } else {
            initials
        }
    }
}

/// Backend acknowledgement of an OTP send.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OtpDispatch {
    /// Seconds until the code expires.
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    /// Seconds before another code may be requested.
    #[serde(default)]
    pub resend_after: Option<i64>,
}

fn default_expires_in() -> i64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initials() {
        let profile = Profile {
            name: "siti nurhaliza binti".into(),
            email: "siti@example.com".into(),
            phone: None,
            whatsapp_verified: false,
            avatar_url: None,
        };
        assert_eq!(profile.initials(), "SN");
    }

    #[test]
    fn test_initials_fallback() {
        let profile = Profile {
            name: "  ".into(),
            email: "x@example.com".into(),
            phone: None,
            whatsapp_verified: false,
            avatar_url: None,
        };
        assert_eq!(profile.initials(), "U");
    }
}
