//! Verification outcome types.

use crate::contract::Interaction;
use crate::error::InteractionError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Which part of the response a mismatch concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    /// Status code differs
    Status,
    /// Header missing or not matching
    Header,
    /// Body value, type or shape differs
    Body,
}

/// A single discrepancy between expected and actual response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    /// Part of the response
    pub kind: MismatchKind,
    /// JSON path, e.g. `$.body.users[0].firstName`
    pub path: String,
    /// Expected value or constraint, rendered as JSON where possible
    pub expected: String,
    /// Actual value, rendered as JSON where possible
    pub actual: String,
    /// Human-readable explanation
    pub message: String,
}

impl Mismatch {
    /// Create a mismatch.
    #[must_use]
    pub fn new(
        kind: MismatchKind,
        path: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (expected {}, actual {})",
            self.path, self.message, self.expected, self.actual
        )
    }
}

/// Result status of one interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionStatus {
    /// Ran and matched
    Passed,
    /// Ran and failed (setup, transport or mismatches)
    Failed,
    /// Excluded by the interaction filter
    Skipped,
}

/// Result of verifying one interaction.
#[derive(Debug, Clone, Serialize)]
pub struct InteractionResult {
    /// Position in the contract document
    pub index: usize,
    /// Interaction description
    pub description: String,
    /// Provider states attached to the interaction
    pub provider_states: Vec<String>,
    /// Result status
    pub status: InteractionStatus,
    /// Setup or transport failure, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<InteractionError>,
    /// Response mismatches
    pub mismatches: Vec<Mismatch>,
    /// Non-fatal problems, such as teardown failures
    pub warnings: Vec<String>,
}

impl InteractionResult {
    fn new(index: usize, interaction: &Interaction, status: InteractionStatus) -> Self {
        Self {
            index,
            description: interaction.description.clone(),
            provider_states: interaction.states().into_iter().map(String::from).collect(),
            status,
            error: None,
            mismatches: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn running(index: usize, interaction: &Interaction) -> Self {
        Self::new(index, interaction, InteractionStatus::Passed)
    }

    pub(crate) fn skipped(index: usize, interaction: &Interaction) -> Self {
        Self::new(index, interaction, InteractionStatus::Skipped)
    }

    /// Settle the status from the recorded error and mismatches.
    pub(crate) fn finish(&mut self) {
        self.status = if self.error.is_some() || !self.mismatches.is_empty() {
            InteractionStatus::Failed
        } else {
            InteractionStatus::Passed
        };
    }

    /// Whether the interaction was executed.
    #[must_use]
    pub fn ran(&self) -> bool {
        self.status != InteractionStatus::Skipped
    }

    /// Whether the interaction passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == InteractionStatus::Passed
    }

    /// Whether the interaction failed.
    #[must_use]
    pub fn failed(&self) -> bool {
        self.status == InteractionStatus::Failed
    }
}

/// Structured outcome of one verify call.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationOutcome {
    /// Consumer name as configured
    pub consumer: String,
    /// Provider name as configured
    pub provider: String,
    /// Pact source as configured
    pub source: String,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
    /// Per-interaction results in document order
    pub interactions: Vec<InteractionResult>,
}

impl VerificationOutcome {
    /// Whether every executed interaction passed.
    #[must_use]
    pub fn success(&self) -> bool {
        self.interactions.iter().all(|r| !r.failed())
    }

    /// Number of executed interactions.
    #[must_use]
    pub fn executed(&self) -> usize {
        self.interactions.iter().filter(|r| r.ran()).count()
    }

    /// Number of failed interactions.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.interactions.iter().filter(|r| r.failed()).count()
    }

    /// Number of interactions skipped by the filter.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.interactions.iter().filter(|r| !r.ran()).count()
    }

    /// Failed interaction results.
    pub fn failures(&self) -> impl Iterator<Item = &InteractionResult> {
        self.interactions.iter().filter(|r| r.failed())
    }

    /// All mismatches across interactions.
    pub fn mismatches(&self) -> impl Iterator<Item = &Mismatch> {
        self.interactions.iter().flat_map(|r| r.mismatches.iter())
    }

    /// One-line summary suitable for logs and CI output.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.success() {
            format!(
                "{} honours pact with {}: {} interactions verified, {} skipped",
                self.provider,
                self.consumer,
                self.executed(),
                self.skipped()
            )
        } else {
            let failed: Vec<_> = self.failures().map(|r| r.description.as_str()).collect();
            format!(
                "{} does not honour pact with {}: {} of {} failed: {}",
                self.provider,
                self.consumer,
                failed.len(),
                self.executed(),
                failed.join(", ")
            )
        }
    }
}
