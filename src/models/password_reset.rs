//! Password reset token model
//!
//! Only the SHA-256 hash of the emailed token is stored.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct PasswordReset {
    pub token_hash: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl PasswordReset {
    /// A token can be redeemed once, before it expires
    pub fn is_redeemable(&self) -> bool {
        !self.used && self.expires_at > Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn reset(used: bool, expires_in: Duration) -> PasswordReset {
        let now = Utc::now();
        PasswordReset {
            token_hash: "abc".to_string(),
            user_id: 1,
            expires_at: now + expires_in,
            used,
            created_at: now,
        }
    }

    #[test]
    fn test_is_redeemable() {
        assert!(reset(false, Duration::hours(1)).is_redeemable());
        assert!(!reset(true, Duration::hours(1)).is_redeemable());
        assert!(!reset(false, Duration::minutes(-1)).is_redeemable());
    }
}
