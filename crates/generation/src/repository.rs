use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};

use models::{Budget, BudgetTemplate, NewBudget, NewTransaction, Transaction, TransactionTemplate};

use crate::error::Result;

/// Source of budget templates that are due for generation.
///
/// Together with `mark_executed` this forms the idempotency boundary: a
/// template only becomes due again once a full recurrence period has elapsed
/// since its execution stamp, so re-running inside the same period (even
/// after a process restart) is a no-op.
#[async_trait]
pub trait BudgetTemplateSource: Send + Sync {
    /// Returns templates where the recurrence is set, the anchor date has
    /// been reached, the end date (if any) has not passed, and at least one
    /// full period has elapsed since the last execution stamp.
    async fn get_due(&self, now: DateTime<Utc>) -> Result<Vec<BudgetTemplate>>;

    /// Records the execution stamp. The only template write generation performs.
    async fn mark_executed(&self, template_id: &str, when: DateTime<Utc>) -> Result<()>;
}

/// Source of transaction templates that are due for generation.
#[async_trait]
pub trait TransactionTemplateSource: Send + Sync {
    async fn get_due(&self, now: DateTime<Utc>) -> Result<Vec<TransactionTemplate>>;

    async fn mark_executed(&self, template_id: &str, when: DateTime<Utc>) -> Result<()>;
}

/// Store for generated budgets.
#[async_trait]
pub trait BudgetStore: Send + Sync {
    /// Whether a budget generated from this template already covers the
    /// exact period. Defense in depth on top of the due-query filter.
    async fn exists_for_period(
        &self,
        template_id: &str,
        account_id: Option<&str>,
        category_id: Option<&str>,
        period_start: NaiveDateTime,
        period_end: NaiveDateTime,
    ) -> Result<bool>;

    async fn create(&self, budget: NewBudget) -> Result<Budget>;
}

/// Store for generated transactions.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Number of transactions already generated from this template; feeds
    /// the occurrence-based due-date computation.
    async fn count_for_template(&self, template_id: &str) -> Result<u32>;

    async fn create(&self, transaction: NewTransaction) -> Result<Transaction>;
}
