//! Core domain model, freshness policy, and engagement scoring for PageLens.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "pagelens-core";

/// Cached pages older than this trigger re-acquisition.
pub const STALE_AFTER_HOURS: i64 = 24;

/// Root company-profile entity, keyed by an externally assigned identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
    pub profile_image: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub followers: i64,
    pub head_count: Option<String>,
    pub specialties: Vec<String>,
    pub company_type: Option<String>,
    pub founded_year: Option<i32>,
    pub headquarters: Option<String>,
    pub locations: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub page_id: String,
    pub content: Option<String>,
    pub post_type: Option<String>,
    pub media_urls: Vec<String>,
    pub like_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub posted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author_name: Option<String>,
    pub author_profile_url: Option<String>,
    pub content: Option<String>,
    pub commented_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub page_id: String,
    pub name: Option<String>,
    pub profile_url: Option<String>,
    pub profile_image: Option<String>,
    pub position: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Handoff contract from the acquisition adapter into reconciliation.
///
/// Scalar page fields are optional: a `None` means "keep whatever is stored".
/// List fields are replaced wholesale on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquiredRecord {
    pub page_id: String,
    pub name: Option<String>,
    pub url: Option<String>,
    pub profile_image: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub followers: Option<i64>,
    pub head_count: Option<String>,
    pub specialties: Vec<String>,
    pub company_type: Option<String>,
    pub founded_year: Option<i32>,
    pub headquarters: Option<String>,
    pub locations: Vec<String>,
    pub posts: Vec<AcquiredPost>,
    pub employees: Vec<AcquiredEmployee>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquiredPost {
    pub id: String,
    pub content: Option<String>,
    pub post_type: Option<String>,
    pub media_urls: Vec<String>,
    pub like_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub posted_at: Option<DateTime<Utc>>,
    pub comments: Vec<AcquiredComment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquiredComment {
    pub id: String,
    pub author_name: Option<String>,
    pub author_profile_url: Option<String>,
    pub content: Option<String>,
    pub commented_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquiredEmployee {
    pub id: String,
    pub name: Option<String>,
    pub profile_url: Option<String>,
    pub profile_image: Option<String>,
    pub position: Option<String>,
}

/// Outcome of one acquisition attempt.
///
/// Acquisition never fails outward: an unreachable or unparsable upstream
/// collapses into `Fallback` carrying a synthetic record plus the reason.
/// Callers that only want data use [`FetchOutcome::into_record`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FetchOutcome {
    Acquired(AcquiredRecord),
    Fallback { record: AcquiredRecord, reason: String },
}

impl FetchOutcome {
    pub fn record(&self) -> &AcquiredRecord {
        match self {
            FetchOutcome::Acquired(record) => record,
            FetchOutcome::Fallback { record, .. } => record,
        }
    }

    pub fn into_record(self) -> AcquiredRecord {
        match self {
            FetchOutcome::Acquired(record) => record,
            FetchOutcome::Fallback { record, .. } => record,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, FetchOutcome::Fallback { .. })
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        match self {
            FetchOutcome::Acquired(_) => None,
            FetchOutcome::Fallback { reason, .. } => Some(reason.as_str()),
        }
    }
}

/// Freshness policy: decide whether cached data is recent enough to serve.
///
/// Pure function of its inputs; absence of a cached page is a valid input,
/// not a failure.
pub fn should_refresh(existing: Option<&Page>, force: bool, now: DateTime<Utc>) -> bool {
    let Some(page) = existing else {
        return true;
    };
    if force {
        return true;
    }
    now - page.updated_at > Duration::hours(STALE_AFTER_HOURS)
}

/// Weighted engagement score used to rank posts: likes + 2x comments + 3x shares.
pub fn engagement_score(likes: i64, comments: i64, shares: i64) -> i64 {
    likes + 2 * comments + 3 * shares
}
