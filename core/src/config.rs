use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Caps enforced by the domain services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Log entries per user per local calendar day.
    pub daily_log_cap: u32,
    pub max_favorites: u32,
    pub max_template_items: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            daily_log_cap: 6,
            max_favorites: 20,
            max_template_items: 12,
        }
    }
}

impl Limits {
    /// A zero cap would make the feature unusable, so it is rejected.
    pub fn validate(self) -> Result<Self> {
        for (name, value) in [
            ("daily_log_cap", self.daily_log_cap),
            ("max_favorites", self.max_favorites),
            ("max_template_items", self.max_template_items),
        ] {
            if value == 0 {
                return Err(Error::InvalidLimits(format!("{name} must be at least 1")));
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let limits: Limits = serde_json::from_str(r#"{"daily_log_cap": 3}"#).unwrap();
        assert_eq!(limits.daily_log_cap, 3);
        assert_eq!(limits.max_favorites, 20);
        assert_eq!(limits.max_template_items, 12);
    }

    #[test]
    fn test_zero_cap_rejected() {
        let limits = Limits {
            max_favorites: 0,
            ..Limits::default()
        };
        let err = limits.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidLimits(ref m) if m.contains("max_favorites")));
        assert!(Limits::default().validate().is_ok());
    }
}
