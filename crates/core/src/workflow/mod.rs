pub mod catalog;
pub mod memory;
pub mod orchestrator;
pub mod ports;

pub use catalog::{WorkflowBinding, WorkflowCatalog};
pub use memory::{InMemoryDocumentStore, InMemoryTaskBoard, InMemoryTransactionLedger};
pub use orchestrator::{DecideOutcome, SubmitOutcome, WorkflowOrchestrator};
pub use ports::{DocumentStore, TaskDispatcher, TransactionLedger};
