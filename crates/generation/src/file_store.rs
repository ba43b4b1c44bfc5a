use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use models::{
    Budget, BudgetTemplate, NewBudget, NewTransaction, Recurrence, Transaction,
    TransactionTemplate,
};

use crate::error::{GenerationError, Result};
use crate::repository::{
    BudgetStore, BudgetTemplateSource, TransactionStore, TransactionTemplateSource,
};

/// The on-disk database document. Templates are owned by the surrounding
/// CRUD layer; generation reads them and only ever writes execution stamps
/// and new records.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Database {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    budget_templates: Vec<BudgetTemplate>,
    #[serde(default)]
    transaction_templates: Vec<TransactionTemplate>,
    #[serde(default)]
    budgets: Vec<Budget>,
    #[serde(default)]
    transactions: Vec<Transaction>,
}

/// File-based implementation of the template sources and record stores,
/// backed by a single JSON database file.
pub struct FileStore {
    database_path: PathBuf,
    /// Serializes read-modify-write cycles on the database file.
    file_lock: RwLock<()>,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(database_path: P) -> Self {
        Self {
            database_path: database_path.as_ref().to_path_buf(),
            file_lock: RwLock::new(()),
        }
    }

    /// Load the database from file. A missing file is an empty database so a
    /// fresh deployment works before the CRUD layer has written anything.
    async fn load_database(&self) -> Result<Database> {
        if !self.database_path.exists() {
            debug!(
                "Database file {} not found, treating as empty",
                self.database_path.display()
            );
            return Ok(Database::default());
        }
        let content = tokio::fs::read_to_string(&self.database_path).await?;
        let database: Database = serde_json::from_str(&content)?;
        Ok(database)
    }

    async fn save_database(&self, database: &Database) -> Result<()> {
        if let Some(parent) = self.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_json::to_string_pretty(database)?;
        tokio::fs::write(&self.database_path, content).await?;
        Ok(())
    }

    fn mint_id(database: &mut Database) -> String {
        database.next_id += 1;
        database.next_id.to_string()
    }
}

/// The due query: recurrence set, anchor reached, end date not passed, and
/// at least one full period elapsed since the last execution stamp.
fn is_due(
    recurrence: Recurrence,
    anchor_date: NaiveDate,
    end_date: Option<NaiveDate>,
    last_executed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    if !recurrence.is_recurring() {
        return false;
    }
    let today = now.date_naive();
    if anchor_date > today {
        return false;
    }
    if let Some(end) = end_date {
        if end < today {
            return false;
        }
    }
    match last_executed_at {
        None => true,
        Some(last) => recurrence::period_elapsed(recurrence, last, now),
    }
}

#[async_trait]
impl BudgetTemplateSource for FileStore {
    async fn get_due(&self, now: DateTime<Utc>) -> Result<Vec<BudgetTemplate>> {
        let _guard = self.file_lock.read().await;
        let database = self.load_database().await?;
        Ok(database
            .budget_templates
            .into_iter()
            .filter(|t| is_due(t.recurrence, t.anchor_date, t.end_date, t.last_executed_at, now))
            .collect())
    }

    async fn mark_executed(&self, template_id: &str, when: DateTime<Utc>) -> Result<()> {
        let _guard = self.file_lock.write().await;
        let mut database = self.load_database().await?;
        let template = database
            .budget_templates
            .iter_mut()
            .find(|t| t.id == template_id)
            .ok_or_else(|| GenerationError::TemplateNotFound(template_id.to_string()))?;
        template.last_executed_at = Some(when);
        self.save_database(&database).await
    }
}

#[async_trait]
impl TransactionTemplateSource for FileStore {
    async fn get_due(&self, now: DateTime<Utc>) -> Result<Vec<TransactionTemplate>> {
        let _guard = self.file_lock.read().await;
        let database = self.load_database().await?;
        Ok(database
            .transaction_templates
            .into_iter()
            .filter(|t| is_due(t.recurrence, t.anchor_date, t.end_date, t.last_executed_at, now))
            .collect())
    }

    async fn mark_executed(&self, template_id: &str, when: DateTime<Utc>) -> Result<()> {
        let _guard = self.file_lock.write().await;
        let mut database = self.load_database().await?;
        let template = database
            .transaction_templates
            .iter_mut()
            .find(|t| t.id == template_id)
            .ok_or_else(|| GenerationError::TemplateNotFound(template_id.to_string()))?;
        template.last_executed_at = Some(when);
        self.save_database(&database).await
    }
}

#[async_trait]
impl BudgetStore for FileStore {
    async fn exists_for_period(
        &self,
        template_id: &str,
        account_id: Option<&str>,
        category_id: Option<&str>,
        period_start: NaiveDateTime,
        period_end: NaiveDateTime,
    ) -> Result<bool> {
        let _guard = self.file_lock.read().await;
        let database = self.load_database().await?;
        Ok(database.budgets.iter().any(|b| {
            b.template_id == template_id
                && b.account_id.as_deref() == account_id
                && b.category_id.as_deref() == category_id
                && b.period_start == period_start
                && b.period_end == period_end
        }))
    }

    async fn create(&self, budget: NewBudget) -> Result<Budget> {
        let _guard = self.file_lock.write().await;
        let mut database = self.load_database().await?;
        let record = Budget {
            id: Self::mint_id(&mut database),
            template_id: budget.template_id,
            account_id: budget.account_id,
            category_id: budget.category_id,
            amount_limit: budget.amount_limit,
            period_start: budget.period_start,
            period_end: budget.period_end,
            note: budget.note,
            created_at: Utc::now(),
        };
        database.budgets.push(record.clone());
        self.save_database(&database).await?;
        Ok(record)
    }
}

#[async_trait]
impl TransactionStore for FileStore {
    async fn count_for_template(&self, template_id: &str) -> Result<u32> {
        let _guard = self.file_lock.read().await;
        let database = self.load_database().await?;
        Ok(database
            .transactions
            .iter()
            .filter(|t| t.template_id == template_id)
            .count() as u32)
    }

    async fn create(&self, transaction: NewTransaction) -> Result<Transaction> {
        let _guard = self.file_lock.write().await;
        let mut database = self.load_database().await?;
        let record = Transaction {
            id: Self::mint_id(&mut database),
            template_id: transaction.template_id,
            account_id: transaction.account_id,
            category_id: transaction.category_id,
            amount: transaction.amount,
            date: transaction.date,
            note: transaction.note,
            created_at: Utc::now(),
        };
        database.transactions.push(record.clone());
        self.save_database(&database).await?;
        Ok(record)
    }
}
