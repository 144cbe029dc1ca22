use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use lyra_version::Version;
use serde::{Deserialize, Serialize};

use crate::error::{RetentionError, RetentionResult};

/// Which parameters decide that a version is expendable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionStrategy {
    /// Keep the newest `keep_count` candidates.
    KeepCount,
    /// Keep candidates created within `keep_duration` of now.
    KeepNewerThan,
    /// Keep the newest candidates whose sizes fit in `keep_size_bytes`.
    KeepWithinSize,
    /// Union of the above for whichever parameters are set.
    Mixed,
}

/// A retention policy.
///
/// ```toml
/// strategy = "mixed"
/// keep_count = 20
/// keep_duration_secs = 2592000
/// preserve_first = true
/// preserve_last = true
/// ```
///
/// Parameters left out of a configuration are unset; only the two
/// protection flags default to `true`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub strategy: RetentionStrategy,
    #[serde(default)]
    pub keep_count: Option<u64>,
    #[serde(default, rename = "keep_duration_secs", with = "duration_secs")]
    pub keep_duration: Option<Duration>,
    #[serde(default)]
    pub keep_size_bytes: Option<u64>,
    /// Never select version number 1.
    #[serde(default = "default_true")]
    pub preserve_first: bool,
    /// Never select the highest-numbered version.
    #[serde(default = "default_true")]
    pub preserve_last: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::keep_count(10)
    }
}

impl RetentionPolicy {
    fn with_strategy(strategy: RetentionStrategy) -> Self {
        Self {
            strategy,
            keep_count: None,
            keep_duration: None,
            keep_size_bytes: None,
            preserve_first: true,
            preserve_last: true,
        }
    }

    pub fn keep_count(count: u64) -> Self {
        Self {
            keep_count: Some(count),
            ..Self::with_strategy(RetentionStrategy::KeepCount)
        }
    }

    pub fn keep_newer_than(age: Duration) -> Self {
        Self {
            keep_duration: Some(age),
            ..Self::with_strategy(RetentionStrategy::KeepNewerThan)
        }
    }

    pub fn keep_days(days: u64) -> Self {
        Self::keep_newer_than(Duration::from_secs(days * 24 * 60 * 60))
    }

    pub fn keep_within_size(bytes: u64) -> Self {
        Self {
            keep_size_bytes: Some(bytes),
            ..Self::with_strategy(RetentionStrategy::KeepWithinSize)
        }
    }

    /// A mixed policy with no parameters set; add them with the builders.
    pub fn mixed() -> Self {
        Self::with_strategy(RetentionStrategy::Mixed)
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.keep_count = Some(count);
        self
    }

    pub fn with_duration(mut self, age: Duration) -> Self {
        self.keep_duration = Some(age);
        self
    }

    pub fn with_size(mut self, bytes: u64) -> Self {
        self.keep_size_bytes = Some(bytes);
        self
    }

    pub fn preserve_first(mut self, preserve: bool) -> Self {
        self.preserve_first = preserve;
        self
    }

    pub fn preserve_last(mut self, preserve: bool) -> Self {
        self.preserve_last = preserve;
        self
    }

    /// Check that the strategy has the parameter it needs.
    pub fn validate(&self) -> RetentionResult<()> {
        let missing = match self.strategy {
            RetentionStrategy::KeepCount if self.keep_count.is_none() => Some("keep_count"),
            RetentionStrategy::KeepNewerThan if self.keep_duration.is_none() => {
                Some("keep_duration")
            }
            RetentionStrategy::KeepWithinSize if self.keep_size_bytes.is_none() => {
                Some("keep_size_bytes")
            }
            RetentionStrategy::Mixed
                if self.keep_count.is_none()
                    && self.keep_duration.is_none()
                    && self.keep_size_bytes.is_none() =>
            {
                Some("at least one parameter")
            }
            _ => None,
        };
        match missing {
            Some(param) => Err(RetentionError::InvalidPolicy(format!(
                "{:?} strategy requires {param}",
                self.strategy
            ))),
            None => Ok(()),
        }
    }

    /// Choose which of `versions` this policy would delete at time `now`.
    ///
    /// The result is ordered newest first. Protected versions are never
    /// included, and a zero-valued parameter selects nothing.
    pub fn select(&self, versions: &[Version], now: DateTime<Utc>) -> Vec<Version> {
        let mut ordered: Vec<&Version> = versions.iter().collect();
        ordered.sort_by(|a, b| b.number.cmp(&a.number));

        let highest = ordered.first().map(|v| v.number);
        let candidates: Vec<&Version> = ordered
            .into_iter()
            .filter(|v| !(self.preserve_first && v.number == 1))
            .filter(|v| !(self.preserve_last && Some(v.number) == highest))
            .collect();

        let mut chosen: HashSet<lyra_types::VersionId> = HashSet::new();
        let use_count = matches!(
            self.strategy,
            RetentionStrategy::KeepCount | RetentionStrategy::Mixed
        );
        let use_age = matches!(
            self.strategy,
            RetentionStrategy::KeepNewerThan | RetentionStrategy::Mixed
        );
        let use_size = matches!(
            self.strategy,
            RetentionStrategy::KeepWithinSize | RetentionStrategy::Mixed
        );

        if use_count {
            if let Some(count) = self.keep_count.filter(|c| *c > 0) {
                chosen.extend(candidates.iter().skip(count as usize).map(|v| v.id));
            }
        }
        if use_age {
            if let Some(cutoff) = self.keep_duration.and_then(|d| age_cutoff(now, d)) {
                chosen.extend(
                    candidates
                        .iter()
                        .filter(|v| v.created_at < cutoff)
                        .map(|v| v.id),
                );
            }
        }
        if use_size {
            if let Some(budget) = self.keep_size_bytes.filter(|b| *b > 0) {
                let mut running: u64 = 0;
                let mut over = false;
                for v in &candidates {
                    if !over {
                        running = running.saturating_add(v.size);
                        over = running > budget;
                    }
                    if over {
                        chosen.insert(v.id);
                    }
                }
            }
        }

        candidates
            .into_iter()
            .filter(|v| chosen.contains(&v.id))
            .cloned()
            .collect()
    }
}

fn age_cutoff(now: DateTime<Utc>, age: Duration) -> Option<DateTime<Utc>> {
    if age.is_zero() {
        return None;
    }
    let delta = TimeDelta::from_std(age).ok()?;
    now.checked_sub_signed(delta)
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}
