pub mod error;
pub mod file_store;
pub mod jobs;
pub mod repository;

pub use error::{GenerationError, Result};
pub use file_store::FileStore;
pub use jobs::{BudgetGenerationJob, RunStats, TransactionGenerationJob};
pub use repository::{BudgetStore, BudgetTemplateSource, TransactionStore, TransactionTemplateSource};
