use serde::Serialize;

use crate::error::ItemError;
use crate::state::{ItemState, Stage};

/// Outcome of one requested item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemResult {
    pub source_identifier: String,
    pub stage_reached: Stage,
    pub success: bool,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    /// Where the artifact was published, on success.
    pub output_key: Option<String>,
    /// Conversion wall-clock time, when conversion ran.
    pub duration_ms: Option<u64>,
}

impl ItemResult {
    pub fn succeeded(source_identifier: impl Into<String>, output_key: impl Into<String>) -> Self {
        Self {
            source_identifier: source_identifier.into(),
            stage_reached: Stage::Done,
            success: true,
            error_kind: None,
            error_message: None,
            output_key: Some(output_key.into()),
            duration_ms: None,
        }
    }

    pub fn failed(source_identifier: impl Into<String>, stage: Stage, error: &ItemError) -> Self {
        Self {
            source_identifier: source_identifier.into(),
            stage_reached: stage,
            success: false,
            error_kind: Some(error.kind().to_string()),
            error_message: Some(error.to_string()),
            output_key: None,
            duration_ms: None,
        }
    }

    /// Build the result from a terminal item state. A state that never
    /// finished is reported as a failure at the stage it stopped in.
    pub fn from_state(
        source_identifier: impl Into<String>,
        state: &ItemState,
        output_key: Option<String>,
    ) -> Self {
        match (state, output_key) {
            (ItemState::Active(Stage::Done), Some(key)) => Self::succeeded(source_identifier, key),
            (ItemState::Failed { stage, error }, _) => Self::failed(source_identifier, *stage, error),
            (other, _) => Self {
                source_identifier: source_identifier.into(),
                stage_reached: other.stage(),
                success: false,
                error_kind: Some("incomplete".to_string()),
                error_message: Some(format!("item stopped at stage {:?}", other.stage())),
                output_key: None,
                duration_ms: None,
            },
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: Option<u64>) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

/// Aggregate of a batch run. Counts are derived from `items`, so
/// `succeeded_count + failed_count == total_count` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub total_count: usize,
    pub succeeded_count: usize,
    pub failed_count: usize,
    pub items: Vec<ItemResult>,
    pub generated_utc: Option<String>,
}

impl BatchReport {
    pub fn from_items(items: Vec<ItemResult>, generated_utc: Option<String>) -> Self {
        let succeeded_count = items.iter().filter(|item| item.success).count();
        Self {
            total_count: items.len(),
            succeeded_count,
            failed_count: items.len() - succeeded_count,
            items,
            generated_utc,
        }
    }

    /// Items a caller should re-submit.
    pub fn failed_items(&self) -> impl Iterator<Item = &ItemResult> {
        self.items.iter().filter(|item| !item.success)
    }

    pub fn to_json(&self) -> String {
        // A report holds only strings, integers and booleans.
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
