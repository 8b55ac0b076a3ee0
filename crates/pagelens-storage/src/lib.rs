//! SQLite persistence for PageLens: schema bootstrap, reconcile write
//! primitives, and the read-only query surface.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pagelens_core::{
    AcquiredComment, AcquiredEmployee, AcquiredPost, Comment, Employee, Page, Post,
};
use serde::Serialize;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::info;

pub const CRATE_NAME: &str = "pagelens-storage";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("invalid JSON in column {column}: {source}")]
    Json {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Optional filters for the page search; absent filters match everything.
#[derive(Debug, Clone, Default)]
pub struct PageFilters {
    pub name: Option<String>,
    pub industry: Option<String>,
    pub min_followers: Option<i64>,
    pub max_followers: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostWithComments {
    #[serde(flatten)]
    pub post: Post,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EngagementStats {
    pub total_posts: i64,
    pub total_likes: i64,
    pub total_comments: i64,
    pub total_shares: i64,
    pub average_likes: f64,
    pub average_comments: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionCount {
    pub position: String,
    pub count: i64,
}

/// Handle over the SQLite pool. Cheap to clone; every query borrows one
/// pooled connection for its duration and releases it on drop.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        info!(target: "pagelens::storage", %database_url, "database pool created");
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Single-connection in-memory database for tests. The connection must
    /// never be reaped, or the database goes with it.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn init_schema(&self) -> Result<(), StorageError> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn get_page(&self, page_id: &str) -> Result<Option<Page>, StorageError> {
        let row = sqlx::query("SELECT * FROM pages WHERE id = ?")
            .bind(page_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| page_from_row(&r)).transpose()
    }

    /// Filtered page search with offset/limit pagination. `page` is 1-based;
    /// `total` counts all matches regardless of pagination.
    pub async fn search_pages(
        &self,
        filters: &PageFilters,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Page>, i64), StorageError> {
        let mut clauses: Vec<&str> = Vec::new();
        if filters.name.is_some() {
            clauses.push("name LIKE ?");
        }
        if filters.industry.is_some() {
            clauses.push("industry LIKE ?");
        }
        if filters.min_followers.is_some() {
            clauses.push("followers >= ?");
        }
        if filters.max_followers.is_some() {
            clauses.push("followers <= ?");
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM pages{where_sql}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        count_query = bind_page_filters(count_query, filters);
        let total = count_query.fetch_one(&self.pool).await?;

        let offset = (page.max(1) - 1).saturating_mul(limit);
        let rows_sql = format!("SELECT * FROM pages{where_sql} ORDER BY rowid LIMIT ? OFFSET ?");
        let mut rows_query = sqlx::query(&rows_sql);
        if let Some(name) = &filters.name {
            rows_query = rows_query.bind(like_pattern(name));
        }
        if let Some(industry) = &filters.industry {
            rows_query = rows_query.bind(like_pattern(industry));
        }
        if let Some(min) = filters.min_followers {
            rows_query = rows_query.bind(min);
        }
        if let Some(max) = filters.max_followers {
            rows_query = rows_query.bind(max);
        }
        let rows = rows_query
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let pages = rows
            .iter()
            .map(page_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((pages, total))
    }

    pub async fn recent_posts(&self, page_id: &str, limit: i64) -> Result<Vec<Post>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM posts WHERE page_id = ? ORDER BY posted_at DESC LIMIT ?",
        )
        .bind(page_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(post_from_row).collect()
    }

    pub async fn posts_with_comments(
        &self,
        page_id: &str,
        limit: i64,
        comments_per_post: i64,
    ) -> Result<Vec<PostWithComments>, StorageError> {
        let posts = self.recent_posts(page_id, limit).await?;
        let mut out = Vec::with_capacity(posts.len());
        for post in posts {
            let rows = sqlx::query(
                "SELECT * FROM comments WHERE post_id = ? ORDER BY commented_at DESC LIMIT ?",
            )
            .bind(&post.id)
            .bind(comments_per_post)
            .fetch_all(&self.pool)
            .await?;
            let comments = rows
                .iter()
                .map(comment_from_row)
                .collect::<Result<Vec<_>, _>>()?;
            out.push(PostWithComments { post, comments });
        }
        Ok(out)
    }

    /// Posts inside the trailing day-window ranked by engagement score,
    /// descending; ties resolve in insertion order.
    pub async fn top_posts(
        &self,
        page_id: &str,
        days: i64,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Post>, StorageError> {
        let cutoff = now - chrono::Duration::days(days);
        let rows = sqlx::query(
            "SELECT * FROM posts \
             WHERE page_id = ? AND posted_at >= ? \
             ORDER BY (like_count + comment_count * 2 + share_count * 3) DESC, rowid ASC \
             LIMIT ?",
        )
        .bind(page_id)
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(post_from_row).collect()
    }

    pub async fn engagement_stats(&self, page_id: &str) -> Result<EngagementStats, StorageError> {
        let row = sqlx::query(
            "SELECT COUNT(id) AS total_posts, \
                    SUM(like_count) AS total_likes, \
                    SUM(comment_count) AS total_comments, \
                    SUM(share_count) AS total_shares, \
                    AVG(like_count) AS average_likes, \
                    AVG(comment_count) AS average_comments \
             FROM posts WHERE page_id = ?",
        )
        .bind(page_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(EngagementStats {
            total_posts: row.try_get::<i64, _>("total_posts")?,
            total_likes: row.try_get::<Option<i64>, _>("total_likes")?.unwrap_or(0),
            total_comments: row
                .try_get::<Option<i64>, _>("total_comments")?
                .unwrap_or(0),
            total_shares: row.try_get::<Option<i64>, _>("total_shares")?.unwrap_or(0),
            average_likes: row
                .try_get::<Option<f64>, _>("average_likes")?
                .unwrap_or(0.0),
            average_comments: row
                .try_get::<Option<f64>, _>("average_comments")?
                .unwrap_or(0.0),
        })
    }

    pub async fn search_posts(
        &self,
        page_id: &str,
        keyword: &str,
        limit: i64,
    ) -> Result<Vec<Post>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM posts WHERE page_id = ? AND content LIKE ? \
             ORDER BY posted_at DESC LIMIT ?",
        )
        .bind(page_id)
        .bind(like_pattern(keyword))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(post_from_row).collect()
    }

    pub async fn posts_by_date_range(
        &self,
        page_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Post>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM posts \
             WHERE page_id = ? AND posted_at >= ? AND posted_at <= ? \
             ORDER BY posted_at DESC",
        )
        .bind(page_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(post_from_row).collect()
    }

    pub async fn employees(&self, page_id: &str, limit: i64) -> Result<Vec<Employee>, StorageError> {
        let rows = sqlx::query("SELECT * FROM employees WHERE page_id = ? LIMIT ?")
            .bind(page_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(employee_from_row).collect()
    }

    pub async fn employee_count(&self, page_id: &str) -> Result<i64, StorageError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(id) FROM employees WHERE page_id = ?",
        )
        .bind(page_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn employees_by_position(
        &self,
        page_id: &str,
        keyword: &str,
    ) -> Result<Vec<Employee>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM employees WHERE page_id = ? AND position LIKE ?",
        )
        .bind(page_id)
        .bind(like_pattern(keyword))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(employee_from_row).collect()
    }

    pub async fn employees_by_name(
        &self,
        page_id: &str,
        keyword: &str,
    ) -> Result<Vec<Employee>, StorageError> {
        let rows = sqlx::query("SELECT * FROM employees WHERE page_id = ? AND name LIKE ?")
            .bind(page_id)
            .bind(like_pattern(keyword))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(employee_from_row).collect()
    }

    /// Group-count of employees by position, busiest first. Rows without a
    /// position are skipped.
    pub async fn employee_distribution(
        &self,
        page_id: &str,
    ) -> Result<Vec<PositionCount>, StorageError> {
        let rows = sqlx::query(
            "SELECT position, COUNT(id) AS count FROM employees \
             WHERE page_id = ? AND position IS NOT NULL \
             GROUP BY position ORDER BY count DESC, position ASC",
        )
        .bind(page_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(PositionCount {
                    position: row.try_get("position")?,
                    count: row.try_get("count")?,
                })
            })
            .collect()
    }

    pub async fn recent_employees(
        &self,
        page_id: &str,
        limit: i64,
    ) -> Result<Vec<Employee>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM employees WHERE page_id = ? \
             ORDER BY created_at DESC, seq DESC LIMIT ?",
        )
        .bind(page_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(employee_from_row).collect()
    }
}

// Write primitives. These take a bare connection so the reconcile service can
// run all of them inside a single transaction and commit atomically.

/// Page lookup on a borrowed connection, for use inside a transaction.
pub async fn fetch_page(
    conn: &mut SqliteConnection,
    page_id: &str,
) -> Result<Option<Page>, StorageError> {
    let row = sqlx::query("SELECT * FROM pages WHERE id = ?")
        .bind(page_id)
        .fetch_optional(conn)
        .await?;
    row.map(|r| page_from_row(&r)).transpose()
}

pub async fn insert_page(conn: &mut SqliteConnection, page: &Page) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO pages (id, name, url, profile_image, description, website, industry, \
         followers, head_count, specialties, company_type, founded_year, headquarters, \
         locations, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&page.id)
    .bind(&page.name)
    .bind(&page.url)
    .bind(&page.profile_image)
    .bind(&page.description)
    .bind(&page.website)
    .bind(&page.industry)
    .bind(page.followers)
    .bind(&page.head_count)
    .bind(to_json_list(&page.specialties))
    .bind(&page.company_type)
    .bind(page.founded_year)
    .bind(&page.headquarters)
    .bind(to_json_list(&page.locations))
    .bind(page.created_at)
    .bind(page.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn update_page(conn: &mut SqliteConnection, page: &Page) -> Result<(), StorageError> {
    sqlx::query(
        "UPDATE pages SET name = ?, url = ?, profile_image = ?, description = ?, website = ?, \
         industry = ?, followers = ?, head_count = ?, specialties = ?, company_type = ?, \
         founded_year = ?, headquarters = ?, locations = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(&page.name)
    .bind(&page.url)
    .bind(&page.profile_image)
    .bind(&page.description)
    .bind(&page.website)
    .bind(&page.industry)
    .bind(page.followers)
    .bind(&page.head_count)
    .bind(to_json_list(&page.specialties))
    .bind(&page.company_type)
    .bind(page.founded_year)
    .bind(&page.headquarters)
    .bind(to_json_list(&page.locations))
    .bind(page.updated_at)
    .bind(&page.id)
    .execute(conn)
    .await?;
    Ok(())
}

/// INSERT OR IGNORE keyed on the post id. Returns whether a row landed, so
/// the caller can tell a fresh insert from an already-seen post (which keeps
/// its stored engagement counters untouched).
pub async fn insert_post_if_absent(
    conn: &mut SqliteConnection,
    page_id: &str,
    post: &AcquiredPost,
    now: DateTime<Utc>,
) -> Result<bool, StorageError> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO posts (id, page_id, content, post_type, media_urls, \
         like_count, comment_count, share_count, posted_at, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&post.id)
    .bind(page_id)
    .bind(&post.content)
    .bind(&post.post_type)
    .bind(to_json_list(&post.media_urls))
    .bind(post.like_count)
    .bind(post.comment_count)
    .bind(post.share_count)
    .bind(post.posted_at)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn insert_comment(
    conn: &mut SqliteConnection,
    post_id: &str,
    comment: &AcquiredComment,
    now: DateTime<Utc>,
) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO comments (id, post_id, author_name, author_profile_url, content, \
         commented_at, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&comment.id)
    .bind(post_id)
    .bind(&comment.author_name)
    .bind(&comment.author_profile_url)
    .bind(&comment.content)
    .bind(comment.commented_at)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn insert_employee(
    conn: &mut SqliteConnection,
    page_id: &str,
    employee: &AcquiredEmployee,
    now: DateTime<Utc>,
) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO employees (id, page_id, name, profile_url, profile_image, position, \
         created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&employee.id)
    .bind(page_id)
    .bind(&employee.name)
    .bind(&employee.profile_url)
    .bind(&employee.profile_image)
    .bind(&employee.position)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn delete_comments_for_post(
    conn: &mut SqliteConnection,
    post_id: &str,
) -> Result<(), StorageError> {
    sqlx::query("DELETE FROM comments WHERE post_id = ?")
        .bind(post_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn delete_employees_for_page(
    conn: &mut SqliteConnection,
    page_id: &str,
) -> Result<(), StorageError> {
    sqlx::query("DELETE FROM employees WHERE page_id = ?")
        .bind(page_id)
        .execute(conn)
        .await?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS pages (
    id            TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    url           TEXT,
    profile_image TEXT,
    description   TEXT,
    website       TEXT,
    industry      TEXT,
    followers     INTEGER NOT NULL DEFAULT 0,
    head_count    TEXT,
    specialties   TEXT NOT NULL DEFAULT '[]',
    company_type  TEXT,
    founded_year  INTEGER,
    headquarters  TEXT,
    locations     TEXT NOT NULL DEFAULT '[]',
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS posts (
    id            TEXT PRIMARY KEY,
    page_id       TEXT NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
    content       TEXT,
    post_type     TEXT,
    media_urls    TEXT NOT NULL DEFAULT '[]',
    like_count    INTEGER NOT NULL DEFAULT 0,
    comment_count INTEGER NOT NULL DEFAULT 0,
    share_count   INTEGER NOT NULL DEFAULT 0,
    posted_at     TEXT,
    created_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_posts_page_posted ON posts(page_id, posted_at DESC);

-- Comments and employees are append-only across refresh cycles: the same
-- externally assigned id can land more than once, so the row key is a
-- surrogate and the external id is an indexed plain column.
CREATE TABLE IF NOT EXISTS comments (
    seq                INTEGER PRIMARY KEY AUTOINCREMENT,
    id                 TEXT NOT NULL,
    post_id            TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    author_name        TEXT,
    author_profile_url TEXT,
    content            TEXT,
    commented_at       TEXT,
    created_at         TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id);

CREATE TABLE IF NOT EXISTS employees (
    seq           INTEGER PRIMARY KEY AUTOINCREMENT,
    id            TEXT NOT NULL,
    page_id       TEXT NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
    name          TEXT,
    profile_url   TEXT,
    profile_image TEXT,
    position      TEXT,
    created_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_employees_page ON employees(page_id);
";

fn like_pattern(needle: &str) -> String {
    format!("%{needle}%")
}

fn bind_page_filters<'q>(
    mut query: sqlx::query::QueryScalar<'q, sqlx::Sqlite, i64, sqlx::sqlite::SqliteArguments<'q>>,
    filters: &'q PageFilters,
) -> sqlx::query::QueryScalar<'q, sqlx::Sqlite, i64, sqlx::sqlite::SqliteArguments<'q>> {
    if let Some(name) = &filters.name {
        query = query.bind(like_pattern(name));
    }
    if let Some(industry) = &filters.industry {
        query = query.bind(like_pattern(industry));
    }
    if let Some(min) = filters.min_followers {
        query = query.bind(min);
    }
    if let Some(max) = filters.max_followers {
        query = query.bind(max);
    }
    query
}

fn to_json_list(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

fn json_list(row: &SqliteRow, column: &'static str) -> Result<Vec<String>, StorageError> {
    let raw: String = row.try_get(column)?;
    serde_json::from_str(&raw).map_err(|source| StorageError::Json { column, source })
}

fn page_from_row(row: &SqliteRow) -> Result<Page, StorageError> {
    Ok(Page {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        url: row.try_get("url")?,
        profile_image: row.try_get("profile_image")?,
        description: row.try_get("description")?,
        website: row.try_get("website")?,
        industry: row.try_get("industry")?,
        followers: row.try_get("followers")?,
        head_count: row.try_get("head_count")?,
        specialties: json_list(row, "specialties")?,
        company_type: row.try_get("company_type")?,
        founded_year: row.try_get("founded_year")?,
        headquarters: row.try_get("headquarters")?,
        locations: json_list(row, "locations")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn post_from_row(row: &SqliteRow) -> Result<Post, StorageError> {
    Ok(Post {
        id: row.try_get("id")?,
        page_id: row.try_get("page_id")?,
        content: row.try_get("content")?,
        post_type: row.try_get("post_type")?,
        media_urls: json_list(row, "media_urls")?,
        like_count: row.try_get("like_count")?,
        comment_count: row.try_get("comment_count")?,
        share_count: row.try_get("share_count")?,
        posted_at: row.try_get("posted_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn comment_from_row(row: &SqliteRow) -> Result<Comment, StorageError> {
    Ok(Comment {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        author_name: row.try_get("author_name")?,
        author_profile_url: row.try_get("author_profile_url")?,
        content: row.try_get("content")?,
        commented_at: row.try_get("commented_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn employee_from_row(row: &SqliteRow) -> Result<Employee, StorageError> {
    Ok(Employee {
        id: row.try_get("id")?,
        page_id: row.try_get("page_id")?,
        name: row.try_get("name")?,
        profile_url: row.try_get("profile_url")?,
        profile_image: row.try_get("profile_image")?,
        position: row.try_get("position")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 24, hour, 0, 0).single().unwrap()
    }

    fn mk_page(id: &str, name: &str, industry: &str, followers: i64) -> Page {
        Page {
            id: id.into(),
            name: name.into(),
            url: None,
            profile_image: None,
            description: None,
            website: None,
            industry: Some(industry.into()),
            followers,
            head_count: None,
            specialties: vec!["Software Development".into()],
            company_type: None,
            founded_year: Some(2015),
            headquarters: None,
            locations: vec!["Austin, TX".into()],
            created_at: ts(0),
            updated_at: ts(0),
        }
    }

    fn mk_post(id: &str, likes: i64, comments: i64, shares: i64, hour: u32) -> AcquiredPost {
        AcquiredPost {
            id: id.into(),
            content: Some(format!("post body {id}")),
            post_type: Some("post".into()),
            media_urls: vec![],
            like_count: likes,
            comment_count: comments,
            share_count: shares,
            posted_at: Some(ts(hour)),
            comments: vec![],
        }
    }

    fn mk_employee(id: &str, name: &str, position: Option<&str>) -> AcquiredEmployee {
        AcquiredEmployee {
            id: id.into(),
            name: Some(name.into()),
            profile_url: None,
            profile_image: None,
            position: position.map(Into::into),
        }
    }

    async fn seed_page(store: &Store, page: &Page) {
        let mut conn = store.pool().acquire().await.unwrap();
        insert_page(&mut conn, page).await.unwrap();
    }

    #[tokio::test]
    async fn pagination_returns_offset_slice_and_full_total() {
        let store = Store::in_memory().await.unwrap();
        for i in 0..12 {
            seed_page(
                &store,
                &mk_page(&format!("co-{i:02}"), &format!("Company {i}"), "Tech", 100 + i),
            )
            .await;
        }
        let (rows, total) = store
            .search_pages(&PageFilters::default(), 2, 5)
            .await
            .unwrap();
        assert_eq!(total, 12);
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].id, "co-05");
    }

    #[tokio::test]
    async fn huge_page_number_yields_empty_slice_not_overflow() {
        let store = Store::in_memory().await.unwrap();
        seed_page(&store, &mk_page("acme", "Acme", "Tech", 10)).await;
        let (rows, total) = store
            .search_pages(&PageFilters::default(), i64::MAX, 10)
            .await
            .unwrap();
        assert!(rows.is_empty());
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn follower_filter_is_inclusive_on_both_bounds() {
        let store = Store::in_memory().await.unwrap();
        seed_page(&store, &mk_page("low", "Low", "Tech", 100)).await;
        seed_page(&store, &mk_page("mid", "Mid", "Tech", 500)).await;
        seed_page(&store, &mk_page("high", "High", "Tech", 900)).await;
        seed_page(&store, &mk_page("out", "Out", "Tech", 901)).await;

        let filters = PageFilters {
            min_followers: Some(100),
            max_followers: Some(900),
            ..Default::default()
        };
        let (rows, total) = store.search_pages(&filters, 1, 10).await.unwrap();
        assert_eq!(total, 3);
        let ids: Vec<_> = rows.iter().map(|p| p.id.as_str()).collect();
        assert!(ids.contains(&"low"));
        assert!(ids.contains(&"high"));
        assert!(!ids.contains(&"out"));
    }

    #[tokio::test]
    async fn empty_filter_result_is_not_an_error() {
        let store = Store::in_memory().await.unwrap();
        seed_page(&store, &mk_page("acme", "Acme", "Tech", 10)).await;
        let filters = PageFilters {
            industry: Some("Nonexistent".into()),
            ..Default::default()
        };
        let (rows, total) = store.search_pages(&filters, 1, 10).await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn name_filter_matches_substrings_case_insensitively() {
        let store = Store::in_memory().await.unwrap();
        seed_page(&store, &mk_page("deepsolv", "Deepsolv Inc.", "Tech", 10)).await;
        seed_page(&store, &mk_page("other", "Elsewhere Ltd.", "Tech", 10)).await;
        let filters = PageFilters {
            name: Some("deepsolv".into()),
            ..Default::default()
        };
        let (rows, total) = store.search_pages(&filters, 1, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].id, "deepsolv");
    }

    #[tokio::test]
    async fn engagement_ranking_orders_by_score_with_insertion_tiebreak() {
        let store = Store::in_memory().await.unwrap();
        seed_page(&store, &mk_page("acme", "Acme", "Tech", 10)).await;
        let mut conn = store.pool().acquire().await.unwrap();
        insert_post_if_absent(&mut conn, "acme", &mk_post("p-likes", 10, 0, 0, 10), ts(10))
            .await
            .unwrap();
        insert_post_if_absent(&mut conn, "acme", &mk_post("p-comments", 0, 5, 0, 10), ts(10))
            .await
            .unwrap();
        insert_post_if_absent(&mut conn, "acme", &mk_post("p-shares", 0, 0, 4, 10), ts(10))
            .await
            .unwrap();
        drop(conn);

        let top = store.top_posts("acme", 30, 5, ts(12)).await.unwrap();
        let ids: Vec<_> = top.iter().map(|p| p.id.as_str()).collect();
        // shares post scores 12; the two 10-score posts keep insertion order.
        assert_eq!(ids, vec!["p-shares", "p-likes", "p-comments"]);
    }

    #[tokio::test]
    async fn top_posts_excludes_posts_outside_the_window() {
        let store = Store::in_memory().await.unwrap();
        seed_page(&store, &mk_page("acme", "Acme", "Tech", 10)).await;
        let mut conn = store.pool().acquire().await.unwrap();
        let mut old = mk_post("p-old", 99, 99, 99, 0);
        old.posted_at = Some(ts(0) - chrono::Duration::days(40));
        insert_post_if_absent(&mut conn, "acme", &old, ts(0)).await.unwrap();
        insert_post_if_absent(&mut conn, "acme", &mk_post("p-new", 1, 0, 0, 10), ts(10))
            .await
            .unwrap();
        drop(conn);

        let top = store.top_posts("acme", 30, 5, ts(12)).await.unwrap();
        let ids: Vec<_> = top.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p-new"]);
    }

    #[tokio::test]
    async fn duplicate_post_insert_is_ignored() {
        let store = Store::in_memory().await.unwrap();
        seed_page(&store, &mk_page("acme", "Acme", "Tech", 10)).await;
        let mut conn = store.pool().acquire().await.unwrap();
        let first = insert_post_if_absent(&mut conn, "acme", &mk_post("p1", 1, 0, 0, 10), ts(10))
            .await
            .unwrap();
        let second =
            insert_post_if_absent(&mut conn, "acme", &mk_post("p1", 50, 50, 50, 11), ts(11))
                .await
                .unwrap();
        drop(conn);
        assert!(first);
        assert!(!second);

        // The stored counters are the first acquisition's, never refreshed.
        let posts = store.recent_posts("acme", 10).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].like_count, 1);
    }

    #[tokio::test]
    async fn posts_with_comments_caps_and_orders_each_thread() {
        let store = Store::in_memory().await.unwrap();
        seed_page(&store, &mk_page("acme", "Acme", "Tech", 10)).await;
        let mut conn = store.pool().acquire().await.unwrap();
        insert_post_if_absent(&mut conn, "acme", &mk_post("p1", 1, 3, 0, 10), ts(10))
            .await
            .unwrap();
        insert_post_if_absent(&mut conn, "acme", &mk_post("p2", 1, 0, 0, 11), ts(11))
            .await
            .unwrap();
        for (id, hour) in [("c-old", 8), ("c-mid", 9), ("c-new", 10)] {
            insert_comment(
                &mut conn,
                "p1",
                &AcquiredComment {
                    id: id.into(),
                    author_name: Some("Jane Smith".into()),
                    author_profile_url: None,
                    content: Some("Great post!".into()),
                    commented_at: Some(ts(hour)),
                },
                ts(hour),
            )
            .await
            .unwrap();
        }
        drop(conn);

        let threads = store.posts_with_comments("acme", 10, 2).await.unwrap();
        assert_eq!(threads.len(), 2);
        // Newest post first, and its thread capped at two newest comments.
        assert_eq!(threads[0].post.id, "p2");
        assert!(threads[0].comments.is_empty());
        assert_eq!(threads[1].post.id, "p1");
        let comment_ids: Vec<_> = threads[1].comments.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(comment_ids, vec!["c-new", "c-mid"]);
    }

    #[tokio::test]
    async fn recent_employees_orders_newest_first_with_insertion_tiebreak() {
        let store = Store::in_memory().await.unwrap();
        seed_page(&store, &mk_page("acme", "Acme", "Tech", 10)).await;
        let mut conn = store.pool().acquire().await.unwrap();
        insert_employee(&mut conn, "acme", &mk_employee("e-old", "Jane Smith", None), ts(8))
            .await
            .unwrap();
        insert_employee(&mut conn, "acme", &mk_employee("e-a", "Alex Johnson", None), ts(10))
            .await
            .unwrap();
        insert_employee(&mut conn, "acme", &mk_employee("e-b", "Maria Garcia", None), ts(10))
            .await
            .unwrap();
        drop(conn);

        let recent = store.recent_employees("acme", 2).await.unwrap();
        let ids: Vec<_> = recent.iter().map(|e| e.id.as_str()).collect();
        // Same created_at resolves to the later insertion first.
        assert_eq!(ids, vec!["e-b", "e-a"]);
    }

    #[tokio::test]
    async fn engagement_stats_default_to_zero_for_unknown_page() {
        let store = Store::in_memory().await.unwrap();
        let stats = store.engagement_stats("ghost").await.unwrap();
        assert_eq!(stats.total_posts, 0);
        assert_eq!(stats.total_likes, 0);
        assert_eq!(stats.average_likes, 0.0);
    }

    #[tokio::test]
    async fn engagement_stats_sum_and_average() {
        let store = Store::in_memory().await.unwrap();
        seed_page(&store, &mk_page("acme", "Acme", "Tech", 10)).await;
        let mut conn = store.pool().acquire().await.unwrap();
        insert_post_if_absent(&mut conn, "acme", &mk_post("p1", 10, 2, 1, 10), ts(10))
            .await
            .unwrap();
        insert_post_if_absent(&mut conn, "acme", &mk_post("p2", 20, 4, 3, 11), ts(11))
            .await
            .unwrap();
        drop(conn);

        let stats = store.engagement_stats("acme").await.unwrap();
        assert_eq!(stats.total_posts, 2);
        assert_eq!(stats.total_likes, 30);
        assert_eq!(stats.total_comments, 6);
        assert_eq!(stats.total_shares, 4);
        assert_eq!(stats.average_likes, 15.0);
        assert_eq!(stats.average_comments, 3.0);
    }

    #[tokio::test]
    async fn keyword_search_scopes_to_page_and_content() {
        let store = Store::in_memory().await.unwrap();
        seed_page(&store, &mk_page("acme", "Acme", "Tech", 10)).await;
        seed_page(&store, &mk_page("rival", "Rival", "Tech", 10)).await;
        let mut conn = store.pool().acquire().await.unwrap();
        let mut launch = mk_post("p1", 1, 0, 0, 10);
        launch.content = Some("Excited to announce our product launch!".into());
        insert_post_if_absent(&mut conn, "acme", &launch, ts(10)).await.unwrap();
        let mut rival = mk_post("p2", 1, 0, 0, 10);
        rival.content = Some("Rival product launch".into());
        insert_post_if_absent(&mut conn, "rival", &rival, ts(10)).await.unwrap();
        insert_post_if_absent(&mut conn, "acme", &mk_post("p3", 1, 0, 0, 11), ts(11))
            .await
            .unwrap();
        drop(conn);

        let hits = store.search_posts("acme", "launch", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "p1");
    }

    #[tokio::test]
    async fn distribution_groups_by_position_and_skips_nulls() {
        let store = Store::in_memory().await.unwrap();
        seed_page(&store, &mk_page("acme", "Acme", "Tech", 10)).await;
        let mut conn = store.pool().acquire().await.unwrap();
        for (id, pos) in [
            ("e1", Some("Software Engineer")),
            ("e2", Some("Software Engineer")),
            ("e3", Some("CEO")),
            ("e4", None),
        ] {
            insert_employee(&mut conn, "acme", &mk_employee(id, "Jane Smith", pos), ts(10))
                .await
                .unwrap();
        }
        drop(conn);

        let dist = store.employee_distribution("acme").await.unwrap();
        assert_eq!(dist.len(), 2);
        assert_eq!(dist[0].position, "Software Engineer");
        assert_eq!(dist[0].count, 2);
        assert_eq!(dist[1].count, 1);
        assert_eq!(store.employee_count("acme").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn employee_filters_match_position_and_name() {
        let store = Store::in_memory().await.unwrap();
        seed_page(&store, &mk_page("acme", "Acme", "Tech", 10)).await;
        let mut conn = store.pool().acquire().await.unwrap();
        insert_employee(
            &mut conn,
            "acme",
            &mk_employee("e1", "Maria Garcia", Some("Data Scientist")),
            ts(10),
        )
        .await
        .unwrap();
        insert_employee(
            &mut conn,
            "acme",
            &mk_employee("e2", "John Miller", Some("Sales Executive")),
            ts(10),
        )
        .await
        .unwrap();
        drop(conn);

        let scientists = store.employees_by_position("acme", "scientist").await.unwrap();
        assert_eq!(scientists.len(), 1);
        assert_eq!(scientists[0].id, "e1");
        let marias = store.employees_by_name("acme", "maria").await.unwrap();
        assert_eq!(marias.len(), 1);
        assert_eq!(marias[0].id, "e1");
    }

    #[tokio::test]
    async fn deleting_a_page_cascades_to_posts_comments_employees() {
        let store = Store::in_memory().await.unwrap();
        seed_page(&store, &mk_page("acme", "Acme", "Tech", 10)).await;
        let mut conn = store.pool().acquire().await.unwrap();
        insert_post_if_absent(&mut conn, "acme", &mk_post("p1", 1, 0, 0, 10), ts(10))
            .await
            .unwrap();
        insert_comment(
            &mut conn,
            "p1",
            &AcquiredComment {
                id: "c1".into(),
                author_name: Some("Jane Smith".into()),
                author_profile_url: None,
                content: Some("Great post!".into()),
                commented_at: Some(ts(10)),
            },
            ts(10),
        )
        .await
        .unwrap();
        insert_employee(&mut conn, "acme", &mk_employee("e1", "Jane Smith", None), ts(10))
            .await
            .unwrap();
        sqlx::query("DELETE FROM pages WHERE id = ?")
            .bind("acme")
            .execute(&mut *conn)
            .await
            .unwrap();

        let posts = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        let comments = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comments")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        let employees = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employees")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!((posts, comments, employees), (0, 0, 0));
    }

    #[tokio::test]
    async fn date_range_query_is_inclusive_and_sorted_descending() {
        let store = Store::in_memory().await.unwrap();
        seed_page(&store, &mk_page("acme", "Acme", "Tech", 10)).await;
        let mut conn = store.pool().acquire().await.unwrap();
        for (id, hour) in [("p1", 8), ("p2", 10), ("p3", 12)] {
            insert_post_if_absent(&mut conn, "acme", &mk_post(id, 1, 0, 0, hour), ts(hour))
                .await
                .unwrap();
        }
        drop(conn);

        let posts = store.posts_by_date_range("acme", ts(8), ts(10)).await.unwrap();
        let ids: Vec<_> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p1"]);
    }
}
