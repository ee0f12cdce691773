pub mod in_memory_ledger_repository;
pub mod ledger_repository;
pub mod pg_ledger_repository;

pub use in_memory_ledger_repository::InMemoryLedgerRepository;
pub use ledger_repository::{LedgerCommit, LedgerRepository};
pub use pg_ledger_repository::PgLedgerRepository;
