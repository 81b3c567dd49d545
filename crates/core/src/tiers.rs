//! Per-topic tier tables for statistical field assignment.
//!
//! A [`TierBook`] maps a dominant topic to a [`TierTable`] of percentages.
//! [`assign`] turns those percentages into exact per-record values: counts
//! are apportioned with the largest-remainder method, and records are dealt
//! out in an order shuffled by an RNG seeded from the topic, so a rerun with
//! the same seed reproduces the same assignment.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CoreError;
use crate::fields;
use crate::types::{Fields, RecordId};

/// Tolerance when checking that priority shares sum to 100.
const PERCENT_TOLERANCE: f64 = 0.01;

// ---------------------------------------------------------------------------
// Value enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    #[serde(rename = "P1 - Critical")]
    P1,
    #[serde(rename = "P2 - High")]
    P2,
    #[serde(rename = "P3 - Medium")]
    P3,
    #[serde(rename = "P4 - Low")]
    P4,
    #[serde(rename = "P5 - Very Low")]
    P5,
}

impl Priority {
    /// Stored string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::P1 => "P1 - Critical",
            Priority::P2 => "P2 - High",
            Priority::P3 => "P3 - Medium",
            Priority::P4 => "P4 - Low",
            Priority::P5 => "P5 - Very Low",
        }
    }

    /// Urgency is derived from priority: P1 and P2 are urgent.
    pub fn is_urgent(&self) -> bool {
        matches!(self, Priority::P1 | Priority::P2)
    }
}

/// Who an open action is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingParty {
    Company,
    Customer,
}

impl PendingParty {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingParty::Company => "company",
            PendingParty::Customer => "customer",
        }
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityShare {
    pub priority: Priority,
    pub pct: f64,
}

/// Percentages for one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierTable {
    /// Priority distribution; shares must sum to 100.
    pub priority: Vec<PriorityShare>,
    /// Share of records that need a follow-up.
    pub follow_up_pct: f64,
    /// Share of follow-up records with an action still pending.
    pub action_pending_pct: f64,
    /// Share of pending records waiting on the customer (rest: the company).
    pub customer_pending_pct: f64,
}

impl TierTable {
    fn new(priority: [f64; 5], follow_up_pct: f64, action_pending_pct: f64, customer_pending_pct: f64) -> Self {
        let levels = [Priority::P1, Priority::P2, Priority::P3, Priority::P4, Priority::P5];
        Self {
            priority: levels
                .into_iter()
                .zip(priority)
                .map(|(priority, pct)| PriorityShare { priority, pct })
                .collect(),
            follow_up_pct,
            action_pending_pct,
            customer_pending_pct,
        }
    }

    pub fn validate(&self, name: &str) -> Result<(), CoreError> {
        if self.priority.is_empty() {
            return Err(CoreError::Validation(format!(
                "Tier table '{name}' has no priority shares"
            )));
        }

        let mut seen = Vec::with_capacity(self.priority.len());
        for share in &self.priority {
            validate_pct(share.pct, name, share.priority.as_str())?;
            if seen.contains(&share.priority) {
                return Err(CoreError::Validation(format!(
                    "Tier table '{name}' lists {} twice",
                    share.priority.as_str()
                )));
            }
            seen.push(share.priority);
        }

        let sum: f64 = self.priority.iter().map(|s| s.pct).sum();
        if (sum - 100.0).abs() > PERCENT_TOLERANCE {
            return Err(CoreError::Validation(format!(
                "Tier table '{name}' priority shares sum to {sum}, expected 100"
            )));
        }

        validate_pct(self.follow_up_pct, name, "follow_up_pct")?;
        validate_pct(self.action_pending_pct, name, "action_pending_pct")?;
        validate_pct(self.customer_pending_pct, name, "customer_pending_pct")?;
        Ok(())
    }
}

fn validate_pct(pct: f64, table: &str, field: &str) -> Result<(), CoreError> {
    if !pct.is_finite() || !(0.0..=100.0).contains(&pct) {
        return Err(CoreError::Validation(format!(
            "Tier table '{table}': {field} must be within [0, 100], got {pct}"
        )));
    }
    Ok(())
}

/// Topic → table mapping with a fallback table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierBook {
    pub default: TierTable,
    #[serde(default)]
    pub topics: BTreeMap<String, TierTable>,
}

impl TierBook {
    /// Parse and validate a JSON tier book.
    pub fn from_json_str(json: &str) -> Result<Self, CoreError> {
        let book: TierBook = serde_json::from_str(json)
            .map_err(|e| CoreError::Validation(format!("Invalid tier book: {e}")))?;
        book.validate()?;
        Ok(book)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        self.default.validate("default")?;
        for (topic, table) in &self.topics {
            table.validate(topic)?;
        }
        Ok(())
    }

    /// Table for a topic, matched case- and whitespace-insensitively.
    pub fn table_for(&self, topic: &str) -> &TierTable {
        let wanted = normalize_topic(topic);
        self.topics
            .iter()
            .find(|(name, _)| normalize_topic(name) == wanted)
            .map(|(_, table)| table)
            .unwrap_or(&self.default)
    }
}

impl Default for TierBook {
    /// A small banking-flavoured book used when no `--tiers` file is given.
    fn default() -> Self {
        let topics = [
            ("Fraud & Security", TierTable::new([30.0, 40.0, 20.0, 10.0, 0.0], 85.0, 70.0, 25.0)),
            ("Payments & Transfers", TierTable::new([10.0, 25.0, 40.0, 20.0, 5.0], 60.0, 55.0, 40.0)),
            ("Cards", TierTable::new([8.0, 22.0, 40.0, 25.0, 5.0], 50.0, 55.0, 40.0)),
            ("Loans & Credit", TierTable::new([5.0, 20.0, 45.0, 25.0, 5.0], 55.0, 60.0, 45.0)),
            ("Account Management", TierTable::new([2.0, 10.0, 43.0, 35.0, 10.0], 40.0, 50.0, 50.0)),
        ];

        Self {
            default: TierTable::new([5.0, 15.0, 40.0, 30.0, 10.0], 45.0, 60.0, 35.0),
            topics: topics
                .into_iter()
                .map(|(name, table)| (name.to_string(), table))
                .collect(),
        }
    }
}

/// Lowercase, trim and collapse internal whitespace.
pub fn normalize_topic(topic: &str) -> String {
    topic
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// ---------------------------------------------------------------------------
// Apportionment
// ---------------------------------------------------------------------------

/// Split `n` items across `weights` with the largest-remainder method.
///
/// The result always sums to exactly `n`. Equal remainders go to the earlier
/// weight. When every weight is zero, everything lands in the first bucket.
pub fn apportion(n: usize, weights: &[f64]) -> Vec<usize> {
    if weights.is_empty() {
        return Vec::new();
    }

    let total: f64 = weights.iter().map(|w| w.max(0.0)).sum();
    if total <= 0.0 {
        let mut counts = vec![0; weights.len()];
        counts[0] = n;
        return counts;
    }

    let quotas: Vec<f64> = weights
        .iter()
        .map(|w| n as f64 * w.max(0.0) / total)
        .collect();
    let mut counts: Vec<usize> = quotas.iter().map(|q| q.floor() as usize).collect();

    let assigned: usize = counts.iter().sum();
    let mut remaining = n.saturating_sub(assigned);

    let mut by_remainder: Vec<usize> = (0..weights.len()).collect();
    by_remainder.sort_by(|&a, &b| {
        let ra = quotas[a] - quotas[a].floor();
        let rb = quotas[b] - quotas[b].floor();
        rb.total_cmp(&ra).then(a.cmp(&b))
    });

    for idx in by_remainder.into_iter().cycle() {
        if remaining == 0 {
            break;
        }
        counts[idx] += 1;
        remaining -= 1;
    }

    counts
}

/// Split `n` into (share, rest) for a single percentage.
fn split(n: usize, pct: f64) -> usize {
    apportion(n, &[pct, 100.0 - pct])[0]
}

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

/// Values assigned to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub priority: Priority,
    pub follow_up_required: bool,
    pub action_pending: bool,
    pub pending_from: Option<PendingParty>,
}

impl Assignment {
    pub fn urgency(&self) -> bool {
        self.priority.is_urgent()
    }

    /// Document fields for a `$set`.
    pub fn to_fields(&self) -> Fields {
        let yes_no = |b: bool| if b { "yes" } else { "no" };

        let mut map = Fields::new();
        map.insert(fields::PRIORITY.into(), self.priority.as_str().into());
        map.insert(fields::URGENCY.into(), self.urgency().into());
        map.insert(
            fields::FOLLOW_UP_REQUIRED.into(),
            yes_no(self.follow_up_required).into(),
        );
        map.insert(
            fields::ACTION_PENDING_STATUS.into(),
            yes_no(self.action_pending).into(),
        );
        map.insert(
            fields::ACTION_PENDING_FROM.into(),
            self.pending_from
                .map(|p| serde_json::Value::from(p.as_str()))
                .unwrap_or(serde_json::Value::Null),
        );
        map
    }
}

/// Derive the RNG seed for a topic: caller seed XOR the first 8 bytes of
/// SHA-256 over the normalised topic.
pub fn topic_seed(topic: &str, seed: u64) -> u64 {
    let digest = Sha256::digest(normalize_topic(topic).as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes) ^ seed
}

/// Assign tier values to every record of one topic.
///
/// The output is in sorted id order regardless of input order.
pub fn assign(
    topic: &str,
    ids: &[RecordId],
    table: &TierTable,
    seed: u64,
) -> Vec<(RecordId, Assignment)> {
    let mut sorted = ids.to_vec();
    sorted.sort();
    let n = sorted.len();
    if n == 0 {
        return Vec::new();
    }

    let mut rng = StdRng::seed_from_u64(topic_seed(topic, seed));

    // Priorities dealt in one shuffled order.
    let mut priority_order: Vec<usize> = (0..n).collect();
    priority_order.shuffle(&mut rng);
    let weights: Vec<f64> = table.priority.iter().map(|s| s.pct).collect();
    let counts = apportion(n, &weights);

    let mut priorities = vec![Priority::P3; n];
    let mut cursor = 0;
    for (share, count) in table.priority.iter().zip(counts) {
        for &idx in &priority_order[cursor..cursor + count] {
            priorities[idx] = share.priority;
        }
        cursor += count;
    }

    // Follow-up flags dealt in an independent order; the pending subsets are
    // prefixes of the follow-up set.
    let mut follow_order: Vec<usize> = (0..n).collect();
    follow_order.shuffle(&mut rng);
    let follow_ups = split(n, table.follow_up_pct);
    let pending = split(follow_ups, table.action_pending_pct);
    let customer = split(pending, table.customer_pending_pct);

    let mut assignments: Vec<Assignment> = priorities
        .into_iter()
        .map(|priority| Assignment {
            priority,
            follow_up_required: false,
            action_pending: false,
            pending_from: None,
        })
        .collect();

    for (rank, &idx) in follow_order[..follow_ups].iter().enumerate() {
        let a = &mut assignments[idx];
        a.follow_up_required = true;
        if rank < pending {
            a.action_pending = true;
            a.pending_from = Some(if rank < customer {
                PendingParty::Customer
            } else {
                PendingParty::Company
            });
        }
    }

    sorted.into_iter().zip(assignments).collect()
}
