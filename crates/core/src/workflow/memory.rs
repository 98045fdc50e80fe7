use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::document::{Document, DocumentId, DocumentKind, HierarchyKey};
use crate::domain::task::Task;
use crate::domain::transaction::{ApprovalTransaction, TransactionId, TransactionStatus};
use crate::errors::StoreError;
use crate::workflow::ports::{DocumentStore, TaskDispatcher, TransactionLedger};

#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<String, Document>>,
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find_by_id(&self, id: &DocumentId) -> Result<Option<Document>, StoreError> {
        let documents = self.documents.read().await;
        Ok(documents.get(&id.0).cloned())
    }

    async fn save(&self, document: Document) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        documents.insert(document.id.0.clone(), document);
        Ok(())
    }

    async fn find_open_duplicate(
        &self,
        kind: DocumentKind,
        hierarchy: &HierarchyKey,
        exclude: Option<&DocumentId>,
    ) -> Result<Option<Document>, StoreError> {
        let documents = self.documents.read().await;
        Ok(documents
            .values()
            .filter(|document| document.kind == kind)
            .filter(|document| !document.status.is_terminal_for_approval())
            .filter(|document| &document.hierarchy == hierarchy)
            .find(|document| exclude != Some(&document.id))
            .cloned())
    }
}

#[derive(Default)]
pub struct InMemoryTransactionLedger {
    transactions: RwLock<HashMap<String, ApprovalTransaction>>,
}

#[async_trait]
impl TransactionLedger for InMemoryTransactionLedger {
    async fn find_by_id(
        &self,
        id: &TransactionId,
    ) -> Result<Option<ApprovalTransaction>, StoreError> {
        let transactions = self.transactions.read().await;
        Ok(transactions.get(&id.0).cloned())
    }

    async fn save(&self, transaction: ApprovalTransaction) -> Result<(), StoreError> {
        let mut transactions = self.transactions.write().await;
        transactions.insert(transaction.id.0.clone(), transaction);
        Ok(())
    }

    async fn remove(&self, id: &TransactionId) -> Result<(), StoreError> {
        let mut transactions = self.transactions.write().await;
        transactions.remove(&id.0);
        Ok(())
    }

    async fn list_for_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<ApprovalTransaction>, StoreError> {
        let transactions = self.transactions.read().await;
        let mut history: Vec<ApprovalTransaction> = transactions
            .values()
            .filter(|transaction| &transaction.document_id == document_id)
            .cloned()
            .collect();
        history.sort_by(|left, right| {
            left.step_order
                .cmp(&right.step_order)
                .then_with(|| left.created_at.cmp(&right.created_at))
        });
        Ok(history)
    }

    async fn find_pending_for_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<Option<ApprovalTransaction>, StoreError> {
        let transactions = self.transactions.read().await;
        Ok(transactions
            .values()
            .find(|transaction| {
                &transaction.document_id == document_id
                    && transaction.status == TransactionStatus::Pending
            })
            .cloned())
    }
}

/// Task store that can be told to fail, so compensation paths are testable.
#[derive(Default)]
pub struct InMemoryTaskBoard {
    tasks: RwLock<Vec<Task>>,
    fail_next: AtomicBool,
}

impl InMemoryTaskBoard {
    pub fn fail_next_dispatch(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.tasks.read().await.clone()
    }

    pub async fn tasks_for_assignee(&self, assignee: &str) -> Vec<Task> {
        self.tasks
            .read()
            .await
            .iter()
            .filter(|task| task.assigned_to == assignee)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TaskDispatcher for InMemoryTaskBoard {
    async fn dispatch(&self, task: Task) -> Result<(), StoreError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("task dispatch unavailable".to_string()));
        }
        let mut tasks = self.tasks.write().await;
        tasks.push(task);
        Ok(())
    }
}
