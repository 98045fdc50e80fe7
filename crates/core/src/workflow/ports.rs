use async_trait::async_trait;

use crate::domain::document::{Document, DocumentId, DocumentKind, HierarchyKey};
use crate::domain::task::Task;
use crate::domain::transaction::{ApprovalTransaction, TransactionId};
use crate::errors::StoreError;

/// Persistence seam for documents under approval.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_by_id(&self, id: &DocumentId) -> Result<Option<Document>, StoreError>;

    async fn save(&self, document: Document) -> Result<(), StoreError>;

    /// Finds a non-terminal document of the same kind occupying the same
    /// budget slot, ignoring `exclude` so update flows do not collide with
    /// the record being edited.
    async fn find_open_duplicate(
        &self,
        kind: DocumentKind,
        hierarchy: &HierarchyKey,
        exclude: Option<&DocumentId>,
    ) -> Result<Option<Document>, StoreError>;
}

/// The approval transaction ledger: one row per (document, step) attempt,
/// append-only with status updates. `remove` exists solely so a failed
/// dispatch can be compensated; resolved rows are never deleted.
#[async_trait]
pub trait TransactionLedger: Send + Sync {
    async fn find_by_id(
        &self,
        id: &TransactionId,
    ) -> Result<Option<ApprovalTransaction>, StoreError>;

    async fn save(&self, transaction: ApprovalTransaction) -> Result<(), StoreError>;

    async fn remove(&self, id: &TransactionId) -> Result<(), StoreError>;

    /// Full history for a document, ordered ascending by step order then
    /// creation time. Always a fresh read.
    async fn list_for_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<ApprovalTransaction>, StoreError>;

    async fn find_pending_for_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<Option<ApprovalTransaction>, StoreError>;
}

/// Makes a task visible on the assignee's task list. Implementations persist
/// the row; notification fan-out is layered on top of this seam.
#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    async fn dispatch(&self, task: Task) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for std::sync::Arc<T> {
    async fn find_by_id(&self, id: &DocumentId) -> Result<Option<Document>, StoreError> {
        (**self).find_by_id(id).await
    }

    async fn save(&self, document: Document) -> Result<(), StoreError> {
        (**self).save(document).await
    }

    async fn find_open_duplicate(
        &self,
        kind: DocumentKind,
        hierarchy: &HierarchyKey,
        exclude: Option<&DocumentId>,
    ) -> Result<Option<Document>, StoreError> {
        (**self).find_open_duplicate(kind, hierarchy, exclude).await
    }
}

#[async_trait]
impl<T: TransactionLedger + ?Sized> TransactionLedger for std::sync::Arc<T> {
    async fn find_by_id(
        &self,
        id: &TransactionId,
    ) -> Result<Option<ApprovalTransaction>, StoreError> {
        (**self).find_by_id(id).await
    }

    async fn save(&self, transaction: ApprovalTransaction) -> Result<(), StoreError> {
        (**self).save(transaction).await
    }

    async fn remove(&self, id: &TransactionId) -> Result<(), StoreError> {
        (**self).remove(id).await
    }

    async fn list_for_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<ApprovalTransaction>, StoreError> {
        (**self).list_for_document(document_id).await
    }

    async fn find_pending_for_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<Option<ApprovalTransaction>, StoreError> {
        (**self).find_pending_for_document(document_id).await
    }
}

#[async_trait]
impl<T: TaskDispatcher + ?Sized> TaskDispatcher for std::sync::Arc<T> {
    async fn dispatch(&self, task: Task) -> Result<(), StoreError> {
        (**self).dispatch(task).await
    }
}
