use serde::{Deserialize, Serialize};

/// Outcome of one action on one slave account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountResult {
    pub account_id: i64,
    pub account_name: String,
    pub success: bool,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub order_id: String,
    pub latency_ms: i64,
}

/// Aggregate outcome of one fan-out across all enabled slaves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub total_count: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub results: Vec<AccountResult>,
}

impl ExecutionResult {
    pub fn is_full_success(&self) -> bool {
        self.failed_count == 0
    }

    pub fn is_partial_success(&self) -> bool {
        self.success_count > 0 && self.failed_count > 0
    }

    pub fn is_full_failure(&self) -> bool {
        self.success_count == 0 && self.total_count > 0
    }

    /// Trade status derived from the outcome predicates
    pub fn status(&self) -> &'static str {
        if self.is_full_failure() {
            "failed"
        } else if self.is_partial_success() {
            "partial"
        } else {
            "completed"
        }
    }

    /// Merge another fan-out into this one (multi-symbol cancel path)
    pub fn merge(&mut self, other: ExecutionResult) {
        self.total_count += other.total_count;
        self.success_count += other.success_count;
        self.failed_count += other.failed_count;
        self.results.extend(other.results);
    }
}
