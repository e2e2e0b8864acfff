//! User identity anchor with journey tracking
//!
//! A user progresses Anonymous → Returning → Registered and
//! FirstVisit → Engaged → Converted; neither dimension ever moves backward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trailmark_common::{Error, Result};
use uuid::Uuid;

/// User type: how strongly the visitor's identity is established
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Anonymous,
    Returning,
    Registered,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Anonymous => "anonymous",
            UserType::Returning => "returning",
            UserType::Registered => "registered",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "anonymous" => Ok(UserType::Anonymous),
            "returning" => Ok(UserType::Returning),
            "registered" => Ok(UserType::Registered),
            other => Err(Error::Internal(format!("Unknown user type: {}", other))),
        }
    }
}

/// Journey stage: coarse engagement-lifecycle label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyStage {
    FirstVisit,
    Engaged,
    Converted,
}

impl JourneyStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JourneyStage::FirstVisit => "first_visit",
            JourneyStage::Engaged => "engaged",
            JourneyStage::Converted => "converted",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "first_visit" => Ok(JourneyStage::FirstVisit),
            "engaged" => Ok(JourneyStage::Engaged),
            "converted" => Ok(JourneyStage::Converted),
            other => Err(Error::Internal(format!("Unknown journey stage: {}", other))),
        }
    }
}

/// Which user field a journey transition changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyField {
    Type,
    Stage,
}

impl JourneyField {
    pub fn as_str(&self) -> &'static str {
        match self {
            JourneyField::Type => "type",
            JourneyField::Stage => "stage",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "type" => Ok(JourneyField::Type),
            "stage" => Ok(JourneyField::Stage),
            other => Err(Error::Internal(format!("Unknown journey field: {}", other))),
        }
    }
}

/// One entry in the user's append-only journey history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyTransition {
    pub id: Uuid,
    pub user_id: Uuid,
    pub field: JourneyField,
    pub from_value: String,
    pub to_value: String,
    pub changed_at: DateTime<Utc>,
}

/// User identity anchor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub password_salt: Option<String>,
    pub name: Option<String>,
    pub user_type: UserType,
    pub journey_stage: JourneyStage,
    pub device_id: Option<String>,
    pub total_sessions: i64,
    pub total_messages: i64,
    pub engagement_score: i64,
    pub first_visit_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// New anonymous user in the initial journey state
    pub fn new_anonymous(device_id: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: None,
            password_hash: None,
            password_salt: None,
            name: None,
            user_type: UserType::Anonymous,
            journey_stage: JourneyStage::FirstVisit,
            device_id,
            total_sessions: 0,
            total_messages: 0,
            engagement_score: 0,
            first_visit_at: now,
            last_seen_at: now,
            created_at: now,
            updated_at: now,
        }
    }
}
