//! Refresh-or-serve orchestration: freshness check, acquisition, and
//! transactional reconciliation of acquired records into the store.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pagelens_adapters::{AcquirerConfig, HttpPageAcquirer, OfflineAcquirer, PageAcquirer};
use pagelens_core::{should_refresh, AcquiredRecord, Page};
use pagelens_storage::{self as storage, Store, StorageError};
use tracing::{debug, info, warn};

pub const CRATE_NAME: &str = "pagelens-service";

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("page '{0}' not found")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// How reconciliation treats comments and employees already on record.
///
/// `Append` keeps prior rows and adds the new batch on top, so repeated
/// refreshes accumulate history. `ReplaceChildren` drops the prior comments
/// of each post in the incoming record and the page's employees first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcileMode {
    #[default]
    Append,
    ReplaceChildren,
}

impl ReconcileMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "append" => Some(Self::Append),
            "replace-children" => Some(Self::ReplaceChildren),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub profile_base_url: String,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub max_posts_per_page: usize,
    pub reconcile_mode: ReconcileMode,
    pub offline: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:pagelens.db".to_string()),
            bind_addr: std::env::var("PAGELENS_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            profile_base_url: std::env::var("PAGELENS_PROFILE_BASE_URL")
                .unwrap_or_else(|_| "https://www.linkedin.com/company".to_string()),
            http_timeout_secs: std::env::var("PAGELENS_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            user_agent: std::env::var("PAGELENS_USER_AGENT")
                .unwrap_or_else(|_| "pagelens-bot/0.1".to_string()),
            max_posts_per_page: std::env::var("PAGELENS_MAX_POSTS_PER_PAGE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(25),
            reconcile_mode: std::env::var("PAGELENS_RECONCILE_MODE")
                .ok()
                .and_then(|v| ReconcileMode::parse(&v))
                .unwrap_or_default(),
            offline: std::env::var("PAGELENS_OFFLINE")
                .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True"))
                .unwrap_or(false),
        }
    }

    pub fn build_acquirer(&self) -> anyhow::Result<Arc<dyn PageAcquirer>> {
        if self.offline {
            info!("acquisition running in offline mode, serving synthetic records only");
            return Ok(Arc::new(OfflineAcquirer));
        }
        let acquirer = HttpPageAcquirer::new(AcquirerConfig {
            profile_base_url: self.profile_base_url.clone(),
            timeout: Duration::from_secs(self.http_timeout_secs),
            user_agent: self.user_agent.clone(),
            max_posts: self.max_posts_per_page,
        })?;
        Ok(Arc::new(acquirer))
    }
}

/// Read-mostly service over the store, with scrape-on-miss population.
#[derive(Clone)]
pub struct PageService {
    store: Store,
    acquirer: Arc<dyn PageAcquirer>,
    reconcile_mode: ReconcileMode,
    max_posts: usize,
}

impl PageService {
    pub fn new(store: Store, acquirer: Arc<dyn PageAcquirer>) -> Self {
        Self {
            store,
            acquirer,
            reconcile_mode: ReconcileMode::default(),
            max_posts: 25,
        }
    }

    pub fn with_reconcile_mode(mut self, mode: ReconcileMode) -> Self {
        self.reconcile_mode = mode;
        self
    }

    pub fn with_max_posts(mut self, max_posts: usize) -> Self {
        self.max_posts = max_posts;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Serve the cached page when it is fresh; otherwise acquire and
    /// reconcile before returning.
    ///
    /// A degraded acquisition is absorbed here: the fallback record is
    /// reconciled like any other and the caller sees an ordinary page.
    pub async fn get_or_refresh(&self, page_id: &str, force: bool) -> Result<Page, ServiceError> {
        let existing = self.store.get_page(page_id).await?;
        let now = Utc::now();
        match existing {
            Some(page) if !should_refresh(Some(&page), force, now) => {
                debug!(page_id, "serving cached page");
                return Ok(page);
            }
            _ => {}
        }

        info!(page_id, force, "acquiring page data");
        let outcome = self.acquirer.acquire(page_id).await;
        if let Some(reason) = outcome.fallback_reason() {
            warn!(page_id, reason, "acquisition degraded to synthetic record");
        }
        let record = outcome.into_record();
        self.reconcile(page_id, &record).await?;

        self.store
            .get_page(page_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(page_id.to_string()))
    }

    /// Apply one acquired record to the store inside a single transaction.
    ///
    /// Page scalars follow replace-if-provided merge; lists are overwritten
    /// wholesale. Posts are keyed on id and never refreshed once stored, so
    /// their engagement counters stay at first-acquisition values. Comments
    /// and employees follow the configured [`ReconcileMode`].
    pub async fn reconcile(
        &self,
        page_id: &str,
        record: &AcquiredRecord,
    ) -> Result<(), ServiceError> {
        let now = Utc::now();
        let mut tx = self.store.pool().begin().await.map_err(StorageError::from)?;

        let previous = storage::fetch_page(&mut tx, page_id).await?;
        let page = merge_page(page_id, previous.as_ref(), record, now);
        if previous.is_some() {
            storage::update_page(&mut tx, &page).await?;
        } else {
            storage::insert_page(&mut tx, &page).await?;
        }

        let posts = &record.posts[..record.posts.len().min(self.max_posts)];

        if self.reconcile_mode == ReconcileMode::ReplaceChildren {
            for post in posts {
                storage::delete_comments_for_post(&mut tx, &post.id).await?;
            }
            storage::delete_employees_for_page(&mut tx, page_id).await?;
        }

        let mut inserted_posts = 0usize;
        for post in posts {
            if storage::insert_post_if_absent(&mut tx, page_id, post, now).await? {
                inserted_posts += 1;
            } else {
                debug!(post_id = %post.id, "post already stored, counters kept");
            }
            for comment in &post.comments {
                storage::insert_comment(&mut tx, &post.id, comment, now).await?;
            }
        }
        for employee in &record.employees {
            storage::insert_employee(&mut tx, page_id, employee, now).await?;
        }

        tx.commit().await.map_err(StorageError::from)?;
        info!(
            page_id,
            posts = posts.len(),
            inserted_posts,
            employees = record.employees.len(),
            "reconciled acquired record"
        );
        Ok(())
    }
}

/// Merge an acquired record onto the stored page, if any. `None` scalars
/// keep the stored value; lists always take the incoming batch.
fn merge_page(
    page_id: &str,
    previous: Option<&Page>,
    record: &AcquiredRecord,
    now: DateTime<Utc>,
) -> Page {
    match previous {
        None => Page {
            id: page_id.to_string(),
            name: record.name.clone().unwrap_or_else(|| page_id.to_string()),
            url: record.url.clone(),
            profile_image: record.profile_image.clone(),
            description: record.description.clone(),
            website: record.website.clone(),
            industry: record.industry.clone(),
            followers: record.followers.unwrap_or(0),
            head_count: record.head_count.clone(),
            specialties: record.specialties.clone(),
            company_type: record.company_type.clone(),
            founded_year: record.founded_year,
            headquarters: record.headquarters.clone(),
            locations: record.locations.clone(),
            created_at: now,
            updated_at: now,
        },
        Some(prev) => Page {
            id: prev.id.clone(),
            name: record.name.clone().unwrap_or_else(|| prev.name.clone()),
            url: record.url.clone().or_else(|| prev.url.clone()),
            profile_image: record
                .profile_image
                .clone()
                .or_else(|| prev.profile_image.clone()),
            description: record
                .description
                .clone()
                .or_else(|| prev.description.clone()),
            website: record.website.clone().or_else(|| prev.website.clone()),
            industry: record.industry.clone().or_else(|| prev.industry.clone()),
            followers: record.followers.unwrap_or(prev.followers),
            head_count: record.head_count.clone().or_else(|| prev.head_count.clone()),
            specialties: record.specialties.clone(),
            company_type: record
                .company_type
                .clone()
                .or_else(|| prev.company_type.clone()),
            founded_year: record.founded_year.or(prev.founded_year),
            headquarters: record
                .headquarters
                .clone()
                .or_else(|| prev.headquarters.clone()),
            locations: record.locations.clone(),
            created_at: prev.created_at,
            updated_at: now,
        },
    }
}
