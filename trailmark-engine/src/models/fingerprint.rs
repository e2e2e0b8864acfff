//! Browser fingerprint recognition credential

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored fingerprint observation for a user.
///
/// At most one row exists per (user, hash); repeat observations update
/// `last_seen_at`, `times_seen`, and the recomputed confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserFingerprint {
    pub id: Uuid,
    pub user_id: Uuid,
    pub fingerprint_hash: String,
    /// Original attribute map, retained for re-scoring
    pub raw_components: serde_json::Value,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub device_type: Option<String>,
    pub screen_resolution: Option<String>,
    pub timezone: Option<String>,
    pub language: Option<String>,
    pub confidence_score: i64,
    pub components_count: i64,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub times_seen: i64,
}

impl UserFingerprint {
    /// Record another observation of this fingerprint
    pub fn update_seen(&mut self, now: DateTime<Utc>) {
        self.last_seen_at = now;
        self.times_seen += 1;
    }

    /// Recompute confidence from component coverage and observation stability:
    /// up to 70 points for components, up to 30 for repeat sightings.
    pub fn recompute_confidence(&mut self) -> i64 {
        let base = (self.components_count * 5).min(70);
        let stability = (self.times_seen * 2).min(30);
        self.confidence_score = (base + stability).min(100);
        self.confidence_score
    }
}
