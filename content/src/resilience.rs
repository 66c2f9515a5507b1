//! Date fallback: graceful degradation for the read path.
//!
//! The display endpoint prefers today's image but will serve an older one
//! rather than nothing. The lookback is an ordered chain of date tiers:
//!
//! ```text
//! resolve(chain, lookup)
//!   ├─ today found       → Resolved { level: Full, served_by: today }
//!   ├─ older day found   → Resolved { level: Partial, warnings, ... }
//!   └─ nothing found     → Resolved { level: Unavailable, payload: None }
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use content::resilience::DateFallbackChain;
//!
//! let chain = DateFallbackChain::lookback("display", today, 2); // today, yesterday
//! let resolved = chain.resolve(|date| find_image(date)).await;
//! ```

use std::future::Future;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::keys;

/// How far from the preferred tier the served result is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DegradationLevel {
    /// The first tier (today) served the result.
    Full,
    /// An older tier served the result.
    Partial,
    /// No tier had a result.
    Unavailable,
}

impl std::fmt::Display for DegradationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Partial => write!(f, "partial"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// A resolution result wrapped with fallback metadata.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    pub payload: T,
    pub level: DegradationLevel,
    /// The date whose tier produced the payload.
    pub served_by: Option<NaiveDate>,
    /// One entry per tier that was skipped.
    pub warnings: Vec<String>,
}

impl<T> Resolved<T> {
    pub fn is_full(&self) -> bool {
        self.level == DegradationLevel::Full
    }

    pub fn is_degraded(&self) -> bool {
        self.level != DegradationLevel::Full
    }
}

/// A single date in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackTier {
    pub date: NaiveDate,
    /// Distance from the preferred date, in days.
    pub days_back: u32,
}

/// Ordered chain of dates, most preferred first. Never empty once built
/// through [`DateFallbackChain::lookback`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateFallbackChain {
    pub name: String,
    pub tiers: Vec<FallbackTier>,
}

impl DateFallbackChain {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tiers: Vec::new(),
        }
    }

    pub fn add_tier(mut self, date: NaiveDate, days_back: u32) -> Self {
        self.tiers.push(FallbackTier { date, days_back });
        self
    }

    /// `days` consecutive dates ending at `today`, newest first.
    /// A length below one is raised to one.
    pub fn lookback(name: &str, today: NaiveDate, days: u32) -> Self {
        (0..days.max(1)).fold(Self::new(name), |chain, back| {
            match today.checked_sub_days(Days::new(u64::from(back))) {
                Some(date) => chain.add_tier(date, back),
                None => chain,
            }
        })
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.tiers.iter().map(|t| t.date)
    }

    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    /// Try each tier in order and return the first success.
    ///
    /// The lookup returns `Err(reason)` for a tier that has nothing to serve
    /// (absent or failed); the reason is kept in `warnings`.
    pub async fn resolve<T, F, Fut>(&self, mut lookup: F) -> Resolved<Option<T>>
    where
        F: FnMut(NaiveDate) -> Fut,
        Fut: Future<Output = Result<T, String>>,
    {
        let mut warnings = Vec::new();

        for (idx, tier) in self.tiers.iter().enumerate() {
            match lookup(tier.date).await {
                Ok(payload) => {
                    let level = if idx == 0 {
                        DegradationLevel::Full
                    } else {
                        DegradationLevel::Partial
                    };
                    return Resolved {
                        payload: Some(payload),
                        level,
                        served_by: Some(tier.date),
                        warnings,
                    };
                }
                Err(reason) => warnings.push(format!(
                    "{} {}: {}",
                    self.name,
                    keys::date_key(tier.date),
                    reason
                )),
            }
        }

        Resolved {
            payload: None,
            level: DegradationLevel::Unavailable,
            served_by: None,
            warnings,
        }
    }
}
