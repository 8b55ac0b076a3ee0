//! Acquisition adapter: best-effort HTML extraction with a seeded synthetic
//! fallback. By contract acquisition never fails outward; every failure path
//! collapses into [`FetchOutcome::Fallback`].

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use pagelens_core::{
    AcquiredComment, AcquiredEmployee, AcquiredPost, AcquiredRecord, FetchOutcome,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{debug, warn};

pub const CRATE_NAME: &str = "pagelens-adapters";

pub const DEFAULT_PROFILE_BASE_URL: &str = "https://www.linkedin.com/company";
pub const DEFAULT_USER_AGENT: &str = "pagelens-bot/0.1";

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("fetching {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("upstream status {status} for {url}")]
    Status { status: u16, url: String },
    #[error("invalid selector: {0}")]
    Selector(String),
}

/// Opaque upstream data source. Implementations must absorb every internal
/// failure into a fallback record rather than erroring.
#[async_trait]
pub trait PageAcquirer: Send + Sync {
    async fn acquire(&self, page_id: &str) -> FetchOutcome;
}

#[derive(Debug, Clone)]
pub struct AcquirerConfig {
    pub profile_base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
    pub max_posts: usize,
}

impl Default for AcquirerConfig {
    fn default() -> Self {
        Self {
            profile_base_url: DEFAULT_PROFILE_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_posts: 25,
        }
    }
}

/// Live acquirer: GET the profile page and run the extraction heuristics,
/// falling back to synthetic data on any transport or parse failure.
#[derive(Debug)]
pub struct HttpPageAcquirer {
    client: reqwest::Client,
    config: AcquirerConfig,
}

impl HttpPageAcquirer {
    pub fn new(config: AcquirerConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .context("building reqwest client")?;
        Ok(Self { client, config })
    }

    fn profile_url(&self, page_id: &str) -> String {
        format!(
            "{}/{page_id}/",
            self.config.profile_base_url.trim_end_matches('/')
        )
    }

    async fn try_acquire(&self, page_id: &str) -> Result<AcquiredRecord, AdapterError> {
        let url = self.profile_url(page_id);
        debug!(target: "pagelens::acquire", %url, "fetching profile page");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| AdapterError::Http {
                url: url.clone(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Status {
                status: status.as_u16(),
                url,
            });
        }
        let body = response.text().await.map_err(|source| AdapterError::Http {
            url: url.clone(),
            source,
        })?;
        extract_record(page_id, &url, &body, self.config.max_posts, Utc::now())
    }
}

#[async_trait]
impl PageAcquirer for HttpPageAcquirer {
    async fn acquire(&self, page_id: &str) -> FetchOutcome {
        match self.try_acquire(page_id).await {
            Ok(record) => FetchOutcome::Acquired(record),
            Err(err) => {
                warn!(target: "pagelens::acquire", page_id, %err, "acquisition failed, serving synthetic fallback");
                FetchOutcome::Fallback {
                    record: SyntheticGenerator::for_page_id(page_id).record(Utc::now()),
                    reason: err.to_string(),
                }
            }
        }
    }
}

/// Acquirer that skips the network entirely; every call is a fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineAcquirer;

#[async_trait]
impl PageAcquirer for OfflineAcquirer {
    async fn acquire(&self, page_id: &str) -> FetchOutcome {
        FetchOutcome::Fallback {
            record: SyntheticGenerator::for_page_id(page_id).record(Utc::now()),
            reason: "offline mode".to_string(),
        }
    }
}

const INDUSTRIES: &[&str] = &["Technology", "Software", "Consulting", "Finance", "Healthcare"];
const COMPANY_TYPES: &[&str] = &["Private Company", "Public Company", "Startup", "Non-profit"];
const CITIES: &[&str] = &["San Francisco, CA", "New York, NY", "Austin, TX", "Remote"];
const HEAD_COUNTS: &[&str] = &["1-10", "11-50", "51-200", "201-500"];
const SPECIALTIES: &[&str] = &[
    "Software Development",
    "AI/ML",
    "Cloud Solutions",
    "Data Analytics",
];
const POST_TOPICS: &[&str] = &[
    "product launch",
    "company news",
    "industry insights",
    "team achievement",
    "partnership announcement",
];
const COMMENT_AUTHORS: &[&str] = &["John Doe", "Jane Smith", "Alex Johnson", "Maria Garcia"];
const COMMENT_TEMPLATES: &[&str] = &[
    "Great post! Very insightful.",
    "Thanks for sharing this information.",
    "Looking forward to more updates like this.",
    "This is really helpful, thank you!",
    "Interesting perspective on this topic.",
];
const FIRST_NAMES: &[&str] = &["John", "Jane", "Alex", "Maria", "David", "Sarah", "Michael"];
const LAST_NAMES: &[&str] = &["Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller"];
const POSITIONS: &[&str] = &[
    "Software Engineer",
    "Product Manager",
    "Data Scientist",
    "Marketing Director",
    "Sales Executive",
    "CEO",
    "CTO",
];

/// Deterministic placeholder generator, seeded per call from the identifier's
/// byte sum. Never shared; construct one per acquisition.
pub struct SyntheticGenerator {
    rng: StdRng,
    page_id: String,
}

impl SyntheticGenerator {
    pub fn for_page_id(page_id: &str) -> Self {
        let seed: u64 = page_id.bytes().map(u64::from).sum();
        Self {
            rng: StdRng::seed_from_u64(seed),
            page_id: page_id.to_string(),
        }
    }

    pub fn record(&mut self, now: DateTime<Utc>) -> AcquiredRecord {
        let display_name = title_case_slug(&self.page_id);
        let specialty_count = self.rng.random_range(2..=4usize);
        let location_count = self.rng.random_range(1..=3usize);
        AcquiredRecord {
            page_id: self.page_id.clone(),
            name: Some(format!("{display_name} Inc.")),
            url: Some(format!("{DEFAULT_PROFILE_BASE_URL}/{}", self.page_id)),
            profile_image: Some("https://via.placeholder.com/150".to_string()),
            description: Some(format!(
                "{display_name} is a leading company in its industry, focused on innovation and customer satisfaction."
            )),
            website: Some(format!("https://{}.com", self.page_id)),
            industry: Some(self.pick(INDUSTRIES).to_string()),
            followers: Some(self.rng.random_range(1_000..=50_000)),
            head_count: Some(self.pick(HEAD_COUNTS).to_string()),
            specialties: SPECIALTIES
                .iter()
                .take(specialty_count)
                .map(ToString::to_string)
                .collect(),
            company_type: Some(self.pick(COMPANY_TYPES).to_string()),
            founded_year: Some(self.rng.random_range(2000..=2020)),
            headquarters: Some(self.pick(CITIES).to_string()),
            locations: CITIES
                .iter()
                .take(location_count)
                .map(ToString::to_string)
                .collect(),
            posts: self.posts(10, now),
            employees: self.employees(),
            fetched_at: now,
        }
    }

    pub fn posts(&mut self, count: usize, now: DateTime<Utc>) -> Vec<AcquiredPost> {
        (0..count)
            .map(|i| {
                let id = format!("{}-post-{i}", self.page_id);
                let topic = self.pick(POST_TOPICS);
                let comments = self.comments(&id, now);
                AcquiredPost {
                    content: Some(format!(
                        "We're excited to share our latest {topic}! Stay tuned for more updates."
                    )),
                    post_type: Some("post".to_string()),
                    media_urls: Vec::new(),
                    like_count: self.rng.random_range(5..=500),
                    comment_count: self.rng.random_range(0..=100),
                    share_count: self.rng.random_range(0..=50),
                    posted_at: Some(now - chrono::Duration::hours(i as i64 * 6)),
                    comments,
                    id,
                }
            })
            .collect()
    }

    pub fn comments(&mut self, post_id: &str, now: DateTime<Utc>) -> Vec<AcquiredComment> {
        let count = self.rng.random_range(0..=5usize);
        (0..count)
            .map(|i| AcquiredComment {
                id: format!("{post_id}-c{i}"),
                author_name: Some(self.pick(COMMENT_AUTHORS).to_string()),
                author_profile_url: Some(format!("https://linkedin.com/in/user{i}")),
                content: Some(self.pick(COMMENT_TEMPLATES).to_string()),
                commented_at: Some(now),
            })
            .collect()
    }

    pub fn employees(&mut self) -> Vec<AcquiredEmployee> {
        let count = self.rng.random_range(3..=10usize);
        (0..count)
            .map(|i| {
                let first = self.pick(FIRST_NAMES);
                let last = self.pick(LAST_NAMES);
                let portraits = if i % 2 == 0 { "men" } else { "women" };
                AcquiredEmployee {
                    id: format!("{}-emp-{i}", self.page_id),
                    name: Some(format!("{first} {last}")),
                    profile_url: Some(format!("https://linkedin.com/in/employee{i}")),
                    profile_image: Some(format!(
                        "https://randomuser.me/api/portraits/{portraits}/{i}.jpg"
                    )),
                    position: Some(self.pick(POSITIONS).to_string()),
                }
            })
            .collect()
    }

    fn pick<'a>(&mut self, pool: &[&'a str]) -> &'a str {
        pool[self.rng.random_range(0..pool.len())]
    }
}

/// Run the best-effort heuristics over fetched markup. Fields the page does
/// not expose keep randomized placeholder values from the seeded generator;
/// posts/comments/employees are synthetic except where post containers are
/// recognizable in the markup.
pub fn extract_record(
    page_id: &str,
    url: &str,
    html_text: &str,
    max_posts: usize,
    now: DateTime<Utc>,
) -> Result<AcquiredRecord, AdapterError> {
    let mut record = SyntheticGenerator::for_page_id(page_id).record(now);
    record.url = Some(url.to_string());
    record.posts.truncate(max_posts);

    let document = Html::parse_document(html_text);
    let texts = collect_texts(&document);

    if let Some(name) = select_first_text(&document, "h1")?
        .or(select_first_text(&document, ".org-top-card-summary__title")?)
        .or(select_first_text(&document, "title")?)
    {
        record.name = Some(name);
    }
    if let Some(followers) = follower_count(&texts) {
        record.followers = Some(followers);
    }
    if let Some(industry) = keyword_suffix(&texts, &["industry:", "sector:", "category:", "field:"])
    {
        record.industry = Some(industry);
    }
    if let Some(description) = select_first_text(&document, ".description")?
        .or(select_first_text(&document, ".break-words")?)
        .or(long_paragraph(&document)?)
    {
        record.description = Some(truncate(&description, 500));
    }
    if let Some(logo) = select_first_attr(&document, "img.company-logo", "src")?
        .or(select_first_attr(&document, "img", "src")?)
    {
        record.profile_image = Some(logo);
    }
    if let Some(bucket) = headcount_from_texts(&texts) {
        record.head_count = Some(bucket);
    }
    if let Some(company_type) = keyword_suffix(&texts, &["company type:", "ownership:", "type:"]) {
        record.company_type = Some(company_type);
    }
    if let Some(year) = founded_year(&texts) {
        record.founded_year = Some(year);
    }
    if let Some(hq) = keyword_suffix(&texts, &["headquarters:", "hq:", "based in:", "location:"]) {
        record.headquarters = Some(hq);
    }
    if let Some(website) = select_first_attr(&document, "a.website", "href")?
        .or(select_first_attr(&document, "a[rel=me]", "href")?)
    {
        record.website = Some(website);
    }

    let post_bodies = select_all_texts(&document, "article")?;
    for (post, body) in record.posts.iter_mut().zip(post_bodies) {
        post.content = Some(truncate(&body, 500));
    }

    Ok(record)
}

fn collect_texts(document: &Html) -> Vec<String> {
    document
        .root_element()
        .text()
        .filter_map(|t| text_or_none(t.to_string()))
        .collect()
}

fn text_or_none(value: String) -> Option<String> {
    let trimmed = value.trim().to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn select_first_text(document: &Html, selector: &str) -> Result<Option<String>, AdapterError> {
    let sel = Selector::parse(selector).map_err(|e| AdapterError::Selector(e.to_string()))?;
    Ok(document
        .select(&sel)
        .next()
        .and_then(|n| text_or_none(n.text().collect::<String>())))
}

fn select_all_texts(document: &Html, selector: &str) -> Result<Vec<String>, AdapterError> {
    let sel = Selector::parse(selector).map_err(|e| AdapterError::Selector(e.to_string()))?;
    Ok(document
        .select(&sel)
        .filter_map(|n| text_or_none(n.text().collect::<String>()))
        .collect())
}

fn select_first_attr(
    document: &Html,
    selector: &str,
    attr: &str,
) -> Result<Option<String>, AdapterError> {
    let sel = Selector::parse(selector).map_err(|e| AdapterError::Selector(e.to_string()))?;
    Ok(document
        .select(&sel)
        .next()
        .and_then(|n| n.value().attr(attr))
        .and_then(|s| text_or_none(s.to_string())))
}

fn long_paragraph(document: &Html) -> Result<Option<String>, AdapterError> {
    let paragraphs = select_all_texts(document, "p")?;
    Ok(paragraphs.into_iter().find(|p| p.len() > 20))
}

/// Pull every integer out of a blob of text, tolerating thousands separators.
pub fn extract_numbers(text: &str) -> Vec<i64> {
    let mut out = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_ascii_digit() {
            current.push(ch);
            continue;
        }
        if ch == ',' && !current.is_empty() {
            continue;
        }
        if !current.is_empty() {
            if let Ok(v) = current.parse::<i64>() {
                out.push(v);
            }
            current.clear();
        }
    }
    if !current.is_empty() {
        if let Ok(v) = current.parse::<i64>() {
            out.push(v);
        }
    }
    out
}

fn follower_count(texts: &[String]) -> Option<i64> {
    texts
        .iter()
        .find(|t| t.to_ascii_lowercase().contains("follower"))
        .and_then(|t| extract_numbers(t).into_iter().next())
}

/// First text carrying one of the given `keyword:` prefixes, with everything
/// after the colon returned as the value.
fn keyword_suffix(texts: &[String], keywords: &[&str]) -> Option<String> {
    for text in texts {
        let lower = text.to_ascii_lowercase();
        for keyword in keywords {
            if lower.contains(keyword) {
                let value = text.rsplit(':').next().unwrap_or_default().trim();
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

pub fn headcount_bucket(employees: i64) -> &'static str {
    if employees <= 10 {
        "1-10"
    } else if employees <= 50 {
        "11-50"
    } else if employees <= 200 {
        "51-200"
    } else {
        "201-500"
    }
}

fn headcount_from_texts(texts: &[String]) -> Option<String> {
    let keywords = ["employees", "headcount", "team size", "company size", "staff"];
    for text in texts {
        let lower = text.to_ascii_lowercase();
        if !keywords.iter().any(|k| lower.contains(k)) {
            continue;
        }
        let numbers = extract_numbers(text);
        if numbers.len() >= 2 {
            return Some(format!("{}-{}", numbers[0], numbers[1]));
        }
        if let Some(&n) = numbers.first() {
            return Some(headcount_bucket(n).to_string());
        }
    }
    None
}

fn founded_year(texts: &[String]) -> Option<i32> {
    let keywords = ["founded", "established", "since"];
    let current_year = Utc::now().year();
    for text in texts {
        let lower = text.to_ascii_lowercase();
        if !keywords.iter().any(|k| lower.contains(k)) {
            continue;
        }
        for n in extract_numbers(text) {
            let year = n as i32;
            if (1800..=current_year).contains(&year) {
                return Some(year);
            }
        }
    }
    None
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn title_case_slug(slug: &str) -> String {
    slug.split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
