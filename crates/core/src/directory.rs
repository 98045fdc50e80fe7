use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::process::{ProcessDefinition, ProcessStep};
use crate::errors::StoreError;

/// Lookup of approval process templates by business title.
#[async_trait]
pub trait ProcessDirectory: Send + Sync {
    async fn find_by_title(&self, title: &str) -> Result<Option<ProcessDefinition>, StoreError>;
}

/// Resolves the concrete approver for a step, given who triggered the
/// workflow. The mapping is reference data maintained outside the engine: a
/// per-step default approver, optionally overridden per submitting user.
#[async_trait]
pub trait AssigneeDirectory: Send + Sync {
    async fn resolve(
        &self,
        process_title: &str,
        step: &ProcessStep,
        initiating_user: &str,
    ) -> Result<Option<String>, StoreError>;
}

#[async_trait]
impl<T: ProcessDirectory + ?Sized> ProcessDirectory for std::sync::Arc<T> {
    async fn find_by_title(&self, title: &str) -> Result<Option<ProcessDefinition>, StoreError> {
        (**self).find_by_title(title).await
    }
}

#[async_trait]
impl<T: AssigneeDirectory + ?Sized> AssigneeDirectory for std::sync::Arc<T> {
    async fn resolve(
        &self,
        process_title: &str,
        step: &ProcessStep,
        initiating_user: &str,
    ) -> Result<Option<String>, StoreError> {
        (**self).resolve(process_title, step, initiating_user).await
    }
}

fn normalize_key(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryProcessDirectory {
    processes: HashMap<String, ProcessDefinition>,
}

impl InMemoryProcessDirectory {
    pub fn new(processes: Vec<ProcessDefinition>) -> Self {
        let processes = processes
            .into_iter()
            .map(|process| (normalize_key(&process.title), process))
            .collect();
        Self { processes }
    }
}

#[async_trait]
impl ProcessDirectory for InMemoryProcessDirectory {
    async fn find_by_title(&self, title: &str) -> Result<Option<ProcessDefinition>, StoreError> {
        Ok(self.processes.get(&normalize_key(title)).cloned())
    }
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryAssigneeDirectory {
    defaults: HashMap<(String, i32), String>,
    overrides: HashMap<(String, i32, String), String>,
}

impl InMemoryAssigneeDirectory {
    pub fn with_default(
        mut self,
        process_title: &str,
        step_order: i32,
        assignee: impl Into<String>,
    ) -> Self {
        self.defaults.insert((normalize_key(process_title), step_order), assignee.into());
        self
    }

    pub fn with_override(
        mut self,
        process_title: &str,
        step_order: i32,
        initiating_user: &str,
        assignee: impl Into<String>,
    ) -> Self {
        self.overrides.insert(
            (normalize_key(process_title), step_order, normalize_key(initiating_user)),
            assignee.into(),
        );
        self
    }
}

#[async_trait]
impl AssigneeDirectory for InMemoryAssigneeDirectory {
    async fn resolve(
        &self,
        process_title: &str,
        step: &ProcessStep,
        initiating_user: &str,
    ) -> Result<Option<String>, StoreError> {
        let title_key = normalize_key(process_title);
        let resolved = self
            .overrides
            .get(&(title_key.clone(), step.order, normalize_key(initiating_user)))
            .or_else(|| self.defaults.get(&(title_key, step.order)))
            .cloned();
        Ok(resolved)
    }
}
