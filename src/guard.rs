/// Duplicate and cooldown guard
///
/// Decides whether a candidate post is still eligible for a reply. Rules
/// run in order and short-circuit: already replied, already scanned, then
/// the per-author cooldown (max 2 replies in a trailing 24-hour window).

use anyhow::Result;
use chrono::{Duration, Utc};

use crate::store::Store;

/// Maximum replies to one author inside the cooldown window
const MAX_REPLIES_PER_AUTHOR: i64 = 2;

/// Sliding cooldown window in hours
const COOLDOWN_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyReplied,
    AlreadyScanned,
    UserCooldown,
}

impl SkipReason {
    /// Stable message surfaced in decision responses
    pub fn message(&self) -> &'static str {
        match self {
            SkipReason::AlreadyReplied => "Already replied to this post",
            SkipReason::AlreadyScanned => "Already scanned this post",
            SkipReason::UserCooldown => "User cooldown (max 2 replies per 24h)",
        }
    }
}

/// Check eligibility for a (post, author) pair.
///
/// Returns `Some(reason)` when the post must be skipped, `None` when the
/// pipeline may proceed. The window is computed from "now" at call time,
/// not aligned to calendar days.
pub async fn check(store: &Store, post_id: &str, author_handle: &str) -> Result<Option<SkipReason>> {
    if store.has_replied(post_id).await? {
        return Ok(Some(SkipReason::AlreadyReplied));
    }

    if store.has_scanned(post_id).await? {
        return Ok(Some(SkipReason::AlreadyScanned));
    }

    let window_start = Utc::now() - Duration::hours(COOLDOWN_WINDOW_HOURS);
    let recent = store
        .replies_for_author_since(author_handle, window_start)
        .await?;
    if recent >= MAX_REPLIES_PER_AUTHOR {
        return Ok(Some(SkipReason::UserCooldown));
    }

    Ok(None)
}
