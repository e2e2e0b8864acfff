//! Domain models for the recognition engine

pub mod activity;
pub mod fingerprint;
pub mod session;
pub mod user;

pub use activity::{ActivityRecord, ActivityType};
pub use fingerprint::UserFingerprint;
pub use session::UserSession;
pub use user::{JourneyField, JourneyStage, JourneyTransition, User, UserType};

use serde::{Deserialize, Serialize};

/// Which strategy resolved a request to an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionMethod {
    /// No prior identity matched; a new anonymous user was created
    New,
    /// Matched an existing fingerprint hash (or device-id fallback)
    Fingerprint,
    /// Matched a valid session token
    SessionToken,
}

impl RecognitionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecognitionMethod::New => "new",
            RecognitionMethod::Fingerprint => "fingerprint",
            RecognitionMethod::SessionToken => "session_token",
        }
    }
}
