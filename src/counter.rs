use crate::notification::{NotificationDomain, NotificationRecord, Priority};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Derived counts for one domain's record set. Every closed-set key is
/// always present in `by_type` and `by_priority`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", bound = "")]
pub struct AggregateCounts<D: NotificationDomain> {
    pub total: u64,
    pub unread: u64,
    /// Unread notifications with `urgent` priority.
    pub urgent: u64,
    /// Notifications created on the current UTC day.
    pub today: u64,
    pub by_type: BTreeMap<D::Kind, u64>,
    pub by_priority: BTreeMap<Priority, u64>,
}

impl<D: NotificationDomain> Default for AggregateCounts<D> {
    fn default() -> Self {
        Self {
            total: 0,
            unread: 0,
            urgent: 0,
            today: 0,
            by_type: D::kinds().iter().map(|k| (*k, 0)).collect(),
            by_priority: Priority::ALL.iter().map(|p| (*p, 0)).collect(),
        }
    }
}

impl<D: NotificationDomain> AggregateCounts<D> {
    pub fn count_for(&self, kind: D::Kind) -> u64 {
        self.by_type.get(&kind).copied().unwrap_or(0)
    }

    pub fn count_for_priority(&self, priority: Priority) -> u64 {
        self.by_priority.get(&priority).copied().unwrap_or(0)
    }

    /// True when both sides agree on the scalar counts.
    pub fn agrees_with(&self, other: &Self) -> bool {
        self.total == other.total && self.unread == other.unread
    }
}

/// Counts computed with the wall clock deciding what "today" is.
pub fn compute<D: NotificationDomain>(records: &[NotificationRecord<D>]) -> AggregateCounts<D> {
    compute_at(records, Utc::now())
}

/// Pure form of [`compute`].
pub fn compute_at<D: NotificationDomain>(
    records: &[NotificationRecord<D>],
    now: DateTime<Utc>,
) -> AggregateCounts<D> {
    let today = now.date_naive();
    let mut counts = AggregateCounts::<D>::default();
    for record in records {
        counts.total += 1;
        if !record.is_read {
            counts.unread += 1;
            if record.is_urgent() {
                counts.urgent += 1;
            }
        }
        if record.created_at.date_naive() == today {
            counts.today += 1;
        }
        *counts.by_type.entry(record.kind).or_insert(0) += 1;
        *counts.by_priority.entry(record.priority).or_insert(0) += 1;
    }
    counts
}

/// Counts as returned by a backend counts endpoint. Any key may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerCounts {
    pub total: u64,
    pub unread: u64,
    pub by_type: HashMap<String, u64>,
    pub by_priority: HashMap<String, u64>,
}

impl ServerCounts {
    /// Normalizes into zero-filled counts. `urgent` and `today` are not part
    /// of the server answer and are taken from `records`.
    pub fn into_counts<D: NotificationDomain>(
        self,
        records: &[NotificationRecord<D>],
        now: DateTime<Utc>,
    ) -> AggregateCounts<D> {
        let local = compute_at(records, now);
        let mut counts = AggregateCounts::<D> {
            total: self.total,
            unread: self.unread,
            urgent: local.urgent,
            today: local.today,
            ..Default::default()
        };
        for (key, value) in self.by_type {
            *counts.by_type.entry(D::parse_kind(&key)).or_insert(0) += value;
        }
        for (key, value) in self.by_priority {
            *counts
                .by_priority
                .entry(Priority::parse(&key))
                .or_insert(0) += value;
        }
        counts
    }
}
