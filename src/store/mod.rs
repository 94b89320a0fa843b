//! Knowledge store — the shared persistence surface consumed by the
//! dashboard collaborator.

mod libsql_backend;
mod memory;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use memory::MemoryStore;
pub use traits::{KnowledgeStore, RecordKind, StoredRecord};
