//! Bounded-concurrency document aggregation.
//!
//! Turns a ranked list of [`ScoredMatch`]es into at most `target` document
//! bodies, fetched concurrently.
//!
//! # Algorithm
//!
//! 1. Stable-sort the matches by descending score and keep the first
//!    `target + overhead` as candidates.
//! 2. Spawn one task per candidate on a [`JoinSet`]. Each task resolves the
//!    locator and fetches the body under its own `per_fetch_timeout`.
//! 3. A single coordinating loop joins tasks in completion order until
//!    `target` documents are admitted, every task has finished, or the
//!    overall deadline passes.
//! 4. Remaining tasks are aborted or detached according to [`LatePolicy`].
//!
//! The coordinating loop owns both the admission count and the result list,
//! so admissions are serialized without a lock and the result can never hold
//! more than `target` documents. Fetch failures are logged and counted; the
//! aggregator itself never fails.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::models::{AggregationResult, RetrievedDocument, ScoredMatch};
use crate::services::Fetcher;

/// Extra candidates examined beyond the target, to absorb expected failures.
pub const DEFAULT_FETCH_OVERHEAD: usize = 5;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(10);

/// What happens to fetches still in flight when aggregation returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatePolicy {
    /// Cancel them.
    #[default]
    Abort,
    /// Let them run to completion and ignore their results.
    Detach,
}

/// Tuning for one [`aggregate`] call.
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    /// Maximum number of documents admitted into the result.
    pub target: usize,
    /// Candidates examined beyond `target`.
    pub overhead: usize,
    pub per_fetch_timeout: Duration,
    pub overall_deadline: Duration,
    /// Use a match's inline `content` instead of fetching, when present.
    pub prefer_inline: bool,
    pub late_policy: LatePolicy,
}

impl AggregateOptions {
    pub fn new(target: usize) -> Self {
        Self {
            target,
            overhead: DEFAULT_FETCH_OVERHEAD,
            per_fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            overall_deadline: DEFAULT_DEADLINE,
            prefer_inline: false,
            late_policy: LatePolicy::Abort,
        }
    }
}

/// Sort matches by descending score (ties keep their original order) and
/// keep the first `limit`.
pub fn rank_candidates(matches: &[ScoredMatch], limit: usize) -> Vec<ScoredMatch> {
    let mut ranked = matches.to_vec();
    // sort_by is stable
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(limit);
    ranked
}

/// Fetch documents for `matches` concurrently, admitting at most
/// `options.target` of them.
pub async fn aggregate(
    fetcher: Arc<dyn Fetcher>,
    matches: &[ScoredMatch],
    options: &AggregateOptions,
) -> AggregationResult {
    let target = options.target.max(1);
    let candidates = rank_candidates(matches, target.saturating_add(options.overhead));
    let deadline = Instant::now() + options.overall_deadline;

    let mut result = AggregationResult {
        attempted: candidates.len(),
        ..Default::default()
    };

    if candidates.is_empty() {
        debug!("no candidates to aggregate");
        return result;
    }

    let mut tasks = JoinSet::new();
    for candidate in candidates {
        let fetcher = fetcher.clone();
        let per_fetch = options.per_fetch_timeout;
        let prefer_inline = options.prefer_inline;
        tasks.spawn(async move { resolve(fetcher, candidate, per_fetch, prefer_inline).await });
    }

    while result.documents.len() < target {
        let joined = match timeout_at(deadline, tasks.join_next()).await {
            Ok(Some(joined)) => joined,
            Ok(None) => {
                debug!("all fetch tasks completed");
                break;
            }
            Err(_) => {
                result.deadline_hit = true;
                info!(
                    admitted = result.documents.len(),
                    target, "deadline reached, stopping resource fetching"
                );
                break;
            }
        };

        match joined {
            Ok(Ok(doc)) => {
                result.documents.push(doc);
                info!(
                    "fetched resource {}/{}",
                    result.documents.len(),
                    target
                );
            }
            Ok(Err(e)) => {
                result.failed += 1;
                warn!("skipping resource: {}", e);
            }
            Err(e) => {
                result.failed += 1;
                warn!("fetch task did not complete: {}", e);
            }
        }
    }

    let pending = tasks.len();
    if pending > 0 {
        debug!(pending, policy = ?options.late_policy, "releasing late fetches");
    }
    match options.late_policy {
        LatePolicy::Abort => tasks.abort_all(),
        LatePolicy::Detach => tasks.detach_all(),
    }

    result
}

async fn resolve(
    fetcher: Arc<dyn Fetcher>,
    candidate: ScoredMatch,
    per_fetch: Duration,
    prefer_inline: bool,
) -> Result<RetrievedDocument, FetchError> {
    if prefer_inline {
        if let Some(body) = candidate.inline_content() {
            return Ok(RetrievedDocument {
                locator: candidate.locator().unwrap_or_else(|| candidate.id.clone()),
                body,
                score: candidate.score,
                from_inline: true,
            });
        }
    }

    let locator = candidate
        .locator()
        .ok_or_else(|| FetchError::MissingLocator {
            id: candidate.id.clone(),
        })?;

    let body = match timeout(per_fetch, fetcher.fetch(&locator)).await {
        Ok(fetched) => fetched?,
        Err(_) => {
            return Err(FetchError::Timeout {
                locator,
                after: per_fetch,
            })
        }
    };

    if body.trim().is_empty() {
        return Err(FetchError::EmptyBody { locator });
    }

    Ok(RetrievedDocument {
        locator,
        body,
        score: candidate.score,
        from_inline: false,
    })
}
