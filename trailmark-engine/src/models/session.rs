//! Bounded-lifetime authentication handle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fingerprint::DeviceInfo;

/// A user session. `is_active` flips to false exactly once; after that the
/// session is terminal and `duration_seconds` is frozen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_token: String,
    pub fingerprint_hash: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_info: Option<DeviceInfo>,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub page_views: i64,
    pub messages_sent: i64,
    pub duration_seconds: i64,
    pub logout_at: Option<DateTime<Utc>>,
    pub logout_reason: Option<String>,
}

impl UserSession {
    /// True when the session has outlived its expiry
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Seconds between start and last activity, never negative
    pub fn elapsed_seconds(&self) -> i64 {
        (self.last_activity_at - self.started_at).num_seconds().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session_at(started: DateTime<Utc>) -> UserSession {
        UserSession {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            session_token: "tok".to_string(),
            fingerprint_hash: None,
            ip_address: None,
            user_agent: None,
            device_info: None,
            started_at: started,
            last_activity_at: started,
            expires_at: started + Duration::hours(24),
            is_active: true,
            page_views: 0,
            messages_sent: 0,
            duration_seconds: 0,
            logout_at: None,
            logout_reason: None,
        }
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let session = session_at(now);
        assert!(!session.is_expired(now + Duration::hours(24)));
        assert!(session.is_expired(now + Duration::hours(25)));
    }

    #[test]
    fn test_elapsed_seconds() {
        let now = Utc::now();
        let mut session = session_at(now);
        session.last_activity_at = now + Duration::seconds(90);
        assert_eq!(session.elapsed_seconds(), 90);
    }
}
