use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One stage of a named approval process. `order` defines the position within
/// the process; values must be unique but may be sparse.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStep {
    pub order: i32,
    pub description: String,
    pub approver_role: String,
}

/// An ordered approval template, keyed by its business title
/// (e.g. "Budget Request Approval"). Read-only at workflow execution time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessDefinition {
    pub title: String,
    pub steps: Vec<ProcessStep>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProcessConfigError {
    #[error("process `{title}` has no steps")]
    EmptyProcess { title: String },
    #[error("process `{title}` declares step order {order} more than once")]
    DuplicateStepOrder { title: String, order: i32 },
}

impl ProcessDefinition {
    /// Validates the template and returns it with steps sorted ascending by
    /// order. Duplicate order values are a configuration error, not a
    /// tie to break at runtime.
    pub fn validated(title: impl Into<String>, mut steps: Vec<ProcessStep>) -> Result<Self, ProcessConfigError> {
        let title = title.into();
        if steps.is_empty() {
            return Err(ProcessConfigError::EmptyProcess { title });
        }

        steps.sort_by_key(|step| step.order);
        for pair in steps.windows(2) {
            if pair[0].order == pair[1].order {
                return Err(ProcessConfigError::DuplicateStepOrder {
                    title,
                    order: pair[0].order,
                });
            }
        }

        Ok(Self { title, steps })
    }

    /// The step a freshly submitted document starts on.
    pub fn entry_step(&self) -> Option<&ProcessStep> {
        self.steps.first()
    }

    pub fn step_at(&self, order: i32) -> Option<&ProcessStep> {
        self.steps.iter().find(|step| step.order == order)
    }

    /// The next step strictly after `order`, if the process continues.
    pub fn step_after(&self, order: i32) -> Option<&ProcessStep> {
        self.steps.iter().find(|step| step.order > order)
    }
}
