use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::store::{KvStore, StoreError};

/// Subscription tier. Written to the store as `plan:<identity>` by billing.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Plan {
    #[default]
    Free,
    Pro,
    Agency,
}

impl Plan {
    /// Checks allowed per calendar day (UTC).
    pub fn daily_quota(self) -> u32 {
        match self {
            Plan::Free => 5,
            Plan::Pro => 100,
            Plan::Agency => 1000,
        }
    }

    /// Parse a stored plan value; anything unrecognized is `Free`.
    pub fn from_stored(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.trim().parse().ok()).unwrap_or_default()
    }
}

/// The plan billing recorded for `identity`, `Free` when there is none.
pub async fn lookup_plan(store: &dyn KvStore, identity: &str) -> Result<Plan, StoreError> {
    let stored = store.get(&format!("plan:{identity}")).await?;
    Ok(Plan::from_stored(stored.as_deref()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UsageWindow {
    start: NaiveDate,
    count: u32,
}

/// Outcome of a [`UsageLimiter::try_acquire`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
}

#[derive(Debug, Default)]
struct Windows {
    /// Day of the most recent call; windows from other days are pruned when it changes.
    day: Option<NaiveDate>,
    by_identity: HashMap<String, UsageWindow>,
}

/// Per-identity daily check counter.
///
/// Cheaply cloneable; all clones share the same windows via `Arc`.
#[derive(Clone, Default)]
pub struct UsageLimiter {
    windows: Arc<RwLock<Windows>>,
}

impl UsageLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one check against `identity` if it is still under `quota` for `today`.
    ///
    /// A window that started on any other day is reset first. Denied calls
    /// do not change the count.
    pub async fn try_acquire(&self, identity: &str, quota: u32, today: NaiveDate) -> Decision {
        let mut windows = self.windows.write().await;
        if windows.day != Some(today) {
            windows.day = Some(today);
            windows.by_identity.retain(|_, window| window.start == today);
        }

        let window = windows.by_identity.entry(identity.to_owned()).or_insert(UsageWindow {
            start: today,
            count: 0,
        });

        if window.start != today {
            window.start = today;
            window.count = 0;
        }

        if window.count >= quota {
            return Decision {
                allowed: false,
                limit: quota,
                remaining: 0,
            };
        }

        window.count += 1;
        Decision {
            allowed: true,
            limit: quota,
            remaining: quota - window.count,
        }
    }

    /// Checks already counted for `identity` on `today`.
    pub async fn used(&self, identity: &str, today: NaiveDate) -> u32 {
        match self.windows.read().await.by_identity.get(identity) {
            Some(window) if window.start == today => window.count,
            _ => 0,
        }
    }

    /// Identities with a live window.
    pub async fn tracked(&self) -> usize {
        self.windows.read().await.by_identity.len()
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn plan_quotas() {
        assert_eq!(Plan::Free.daily_quota(), 5);
        assert_eq!(Plan::Pro.daily_quota(), 100);
        assert_eq!(Plan::Agency.daily_quota(), 1000);
    }

    #[test]
    fn unknown_plan_falls_back_to_free() {
        assert_eq!(Plan::from_stored(Some("PRO")), Plan::Pro);
        assert_eq!(Plan::from_stored(Some(" agency ")), Plan::Agency);
        assert_eq!(Plan::from_stored(Some("enterprise")), Plan::Free);
        assert_eq!(Plan::from_stored(None), Plan::Free);
        assert_eq!(Plan::Pro.to_string(), "pro");
    }

    #[tokio::test]
    async fn plan_lookup_reads_store() {
        let store = MemoryStore::new();
        store.set("plan:1.2.3.4", "agency".into()).await.unwrap();
        assert_eq!(lookup_plan(&store, "1.2.3.4").await.unwrap(), Plan::Agency);
        assert_eq!(lookup_plan(&store, "5.6.7.8").await.unwrap(), Plan::Free);
    }

    #[tokio::test]
    async fn denies_after_quota() {
        let limiter = UsageLimiter::new();
        for expected_remaining in (0..3).rev() {
            let decision = limiter.try_acquire("a", 3, day(1)).await;
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }
        let denied = limiter.try_acquire("a", 3, day(1)).await;
        assert!(!denied.allowed);
        assert_eq!(denied.limit, 3);
        assert_eq!(limiter.used("a", day(1)).await, 3);
    }

    #[tokio::test]
    async fn new_day_resets_window() {
        let limiter = UsageLimiter::new();
        limiter.try_acquire("a", 1, day(1)).await;
        assert!(!limiter.try_acquire("a", 1, day(1)).await.allowed);
        assert!(limiter.try_acquire("a", 1, day(2)).await.allowed);
        assert_eq!(limiter.used("a", day(1)).await, 0);
    }

    #[tokio::test]
    async fn stale_windows_are_pruned_on_a_new_day() {
        let limiter = UsageLimiter::new();
        for identity in ["a", "b", "c"] {
            limiter.try_acquire(identity, 5, day(1)).await;
        }
        assert_eq!(limiter.tracked().await, 3);

        limiter.try_acquire("d", 5, day(2)).await;
        assert_eq!(limiter.tracked().await, 1);
        assert_eq!(limiter.used("a", day(2)).await, 0);
        assert_eq!(limiter.used("d", day(2)).await, 1);
    }

    #[tokio::test]
    async fn identities_are_independent() {
        let limiter = UsageLimiter::new();
        assert!(limiter.try_acquire("a", 1, day(1)).await.allowed);
        assert!(limiter.try_acquire("b", 1, day(1)).await.allowed);
        assert!(!limiter.try_acquire("a", 1, day(1)).await.allowed);
    }

    #[tokio::test]
    async fn zero_quota_always_denies() {
        let limiter = UsageLimiter::new();
        let decision = limiter.try_acquire("a", 0, day(1)).await;
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }
}
