use std::collections::{HashMap, HashSet};

use crate::error::ItemError;

/// Decides whether a failed operation on a single item may be re-attempted.
///
/// Retries apply to processor and writer failures: the single failing item
/// is re-attempted with the same processor/writer pair, up to `limit`
/// additional times. Exceeding the limit promotes the failure to the skip
/// decision. Read failures are never retried because the failed read already
/// consumed the source record.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    retryable: HashSet<String>,
    limit: u32,
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an item-error kind as transient.
    pub fn retry_on(mut self, kind: &str) -> Self {
        self.retryable.insert(kind.to_string());
        self
    }

    /// Maximum number of re-attempts per item after the initial failure.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// `attempts` counts failures observed so far for this item.
    pub(crate) fn should_retry(&self, error: &ItemError, attempts: u32) -> bool {
        attempts <= self.limit && self.retryable.contains(error.kind())
    }
}

/// Decides whether a failed item may be dropped without failing the step.
///
/// Each skippable kind carries its own limit; the step keeps a per-kind
/// counter. Below the limit the item is dropped and processing continues;
/// at the limit, or for a kind not registered here, the step fails.
#[derive(Debug, Clone, Default)]
pub struct SkipPolicy {
    limits: HashMap<String, u32>,
}

impl SkipPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows up to `limit` items failing with `kind` to be skipped.
    pub fn skip_on(mut self, kind: &str, limit: u32) -> Self {
        self.limits.insert(kind.to_string(), limit);
        self
    }

    /// `skipped` is the number of items of this kind already skipped.
    pub(crate) fn may_skip(&self, error: &ItemError, skipped: u32) -> bool {
        self.limits
            .get(error.kind())
            .is_some_and(|limit| skipped < *limit)
    }
}
