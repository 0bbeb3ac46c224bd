//! Frontier seeding
//!
//! Seeders turn a configured source into URLs offered to
//! [`FrontierStore::enqueue`](crate::storage::FrontierStore::enqueue). They
//! only run when the frontier is empty, so restarting the robot never
//! re-seeds a crawl in progress. Seeding stops early, keeping what it has
//! committed, when the run is cancelled.

use crate::config::{SeedConfig, SourceConfig, DEFAULT_MAX_SEED, PAGE_ID_PLACEHOLDER};
use crate::storage::Storage;
use crate::{RobotError, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Page size requested from the MediaWiki API (its maximum for clients without bot rights)
const CATEGORY_PAGE_LIMIT: &str = "500";

/// Seeds every configured source if the frontier has no tasks yet
///
/// # Returns
///
/// The number of URLs offered to the frontier across all sources
/// (0 when seeding was skipped)
pub async fn seed_sources<S: Storage>(
    client: &Client,
    storage: &mut S,
    sources: &[SourceConfig],
    now: DateTime<Utc>,
    token: &CancellationToken,
) -> Result<usize> {
    let existing = storage.count_tasks()?;
    if existing > 0 {
        tracing::info!("Frontier holds {} tasks, skipping seeding", existing);
        return Ok(0);
    }

    if sources.is_empty() {
        tracing::warn!("Frontier is empty and no sources are configured");
        return Ok(0);
    }

    let mut total = 0;
    for source in sources {
        if token.is_cancelled() {
            tracing::info!("Seeding interrupted, {} URLs offered so far", total);
            break;
        }

        let offered = match &source.seed {
            SeedConfig::SeedFile { path } => seed_from_file(storage, path, &source.name, now)?,
            SeedConfig::WikiCategory { .. } => {
                seed_from_wiki_category(client, storage, &source.seed, &source.name, now, token)
                    .await?
            }
        };

        tracing::info!(
            "Seeded source '{}': {} URLs inserted (or already present)",
            source.name,
            offered
        );
        total += offered;
    }

    Ok(total)
}

/// Seeds from a file holding one URL per line
///
/// Blank lines are skipped. Lines that do not normalize to a URL are offered
/// anyway and dropped by the frontier.
pub fn seed_from_file<S: Storage>(
    storage: &mut S,
    path: &Path,
    source: &str,
    now: DateTime<Utc>,
) -> Result<usize> {
    let content = std::fs::read_to_string(path).map_err(|e| RobotError::Seed {
        source_name: source.to_string(),
        message: format!("cannot read seed file {}: {}", path.display(), e),
    })?;

    let urls: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    enqueue_all(storage, &urls, source, now)
}

#[derive(Debug, Deserialize)]
struct CategoryMembersResponse {
    #[serde(default)]
    query: Option<CategoryMembersQuery>,

    #[serde(default, rename = "continue")]
    continuation: Option<CategoryMembersContinue>,
}

#[derive(Debug, Deserialize)]
struct CategoryMembersQuery {
    #[serde(default)]
    categorymembers: Vec<CategoryMember>,
}

#[derive(Debug, Deserialize)]
struct CategoryMember {
    #[serde(default)]
    pageid: i64,
}

#[derive(Debug, Deserialize)]
struct CategoryMembersContinue {
    cmcontinue: Option<String>,
}

/// Seeds from the pages of a MediaWiki category
///
/// Pages through `list=categorymembers` and maps every page id through the
/// source's page URL pattern. Stops after `max-seed` pages or when the API
/// returns no continuation token. Other seed kinds offer nothing.
///
/// Each page is committed on its own, so a cancelled `token` ends seeding
/// between pages or aborts the request in flight, keeping earlier pages.
pub async fn seed_from_wiki_category<S: Storage>(
    client: &Client,
    storage: &mut S,
    seed: &SeedConfig,
    source: &str,
    now: DateTime<Utc>,
    token: &CancellationToken,
) -> Result<usize> {
    let SeedConfig::WikiCategory {
        api,
        category,
        page_url_pattern,
        max_seed,
    } = seed
    else {
        return Ok(0);
    };

    let max_seed = max_seed.unwrap_or(DEFAULT_MAX_SEED) as usize;
    let mut continuation: Option<String> = None;
    let mut seeded = 0;

    while seeded < max_seed && !token.is_cancelled() {
        let mut params = vec![
            ("action", "query"),
            ("list", "categorymembers"),
            ("cmtitle", category.as_str()),
            ("cmlimit", CATEGORY_PAGE_LIMIT),
            ("cmtype", "page"),
            ("format", "json"),
        ];
        if let Some(cmcontinue) = &continuation {
            params.push(("cmcontinue", cmcontinue.as_str()));
        }

        let response = tokio::select! {
            biased;

            _ = token.cancelled() => {
                tracing::info!(
                    "Seeding of category '{}' interrupted after {} pages",
                    category,
                    seeded
                );
                break;
            }
            response = fetch_category_page(client, api, &params) => response,
        };

        let page = response.map_err(|e| RobotError::Seed {
            source_name: source.to_string(),
            message: format!("category request to {} failed: {}", api, e),
        })?;

        let members = page.query.map(|q| q.categorymembers).unwrap_or_default();
        if members.is_empty() {
            break;
        }

        let remaining = max_seed - seeded;
        let urls: Vec<String> = members
            .iter()
            .filter(|member| member.pageid > 0)
            .take(remaining)
            .map(|member| page_url_pattern.replace(PAGE_ID_PLACEHOLDER, &member.pageid.to_string()))
            .collect();

        let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        seeded += enqueue_all(storage, &url_refs, source, now)?;
        tracing::debug!("Category '{}': {} pages seeded so far", category, seeded);

        continuation = page.continuation.and_then(|c| c.cmcontinue);
        if continuation.is_none() {
            break;
        }
    }

    Ok(seeded)
}

async fn fetch_category_page(
    client: &Client,
    api: &str,
    params: &[(&str, &str)],
) -> std::result::Result<CategoryMembersResponse, reqwest::Error> {
    client
        .get(api)
        .query(params)
        .send()
        .await?
        .error_for_status()?
        .json::<CategoryMembersResponse>()
        .await
}

/// Offers a batch of URLs to the frontier in one transaction
fn enqueue_all<S: Storage>(
    storage: &mut S,
    urls: &[&str],
    source: &str,
    now: DateTime<Utc>,
) -> Result<usize> {
    let inserted = storage.in_transaction(|store| {
        let mut inserted = 0;
        for url in urls {
            if store.enqueue(url, source, now)? {
                inserted += 1;
            }
        }
        Ok(inserted)
    })?;

    tracing::debug!(
        "Offered {} URLs for source '{}', {} new",
        urls.len(),
        source,
        inserted
    );

    Ok(urls.len())
}
