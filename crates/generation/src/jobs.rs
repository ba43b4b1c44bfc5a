use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use models::{BudgetTemplate, NewBudget, NewTransaction, TransactionTemplate};
use scheduler::Job;

use crate::error::Result;
use crate::repository::{
    BudgetStore, BudgetTemplateSource, TransactionStore, TransactionTemplateSource,
};

/// Per-run counters, reported for observability only.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum Outcome {
    Created,
    Skipped,
}

/// Generates budgets from due budget templates once a day.
pub struct BudgetGenerationJob {
    templates: Arc<dyn BudgetTemplateSource>,
    budgets: Arc<dyn BudgetStore>,
    schedule: String,
}

impl BudgetGenerationJob {
    pub fn new(
        templates: Arc<dyn BudgetTemplateSource>,
        budgets: Arc<dyn BudgetStore>,
        schedule: impl Into<String>,
    ) -> Self {
        Self {
            templates,
            budgets,
            schedule: schedule.into(),
        }
    }

    async fn process_template(
        &self,
        template: &BudgetTemplate,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        let (period_start, period_end) =
            recurrence::next_period(template.recurrence, template.anchor_date, now.naive_utc());

        // Defense in depth: the due query already filters stamped templates,
        // but an overlapping tick or second process instance could get here
        // with a period that is already covered.
        let duplicate = self
            .budgets
            .exists_for_period(
                &template.id,
                template.account_id.as_deref(),
                template.category_id.as_deref(),
                period_start,
                period_end,
            )
            .await?;
        if duplicate {
            debug!(
                "Budget for template {} already covers period starting {}, skipping",
                template.id, period_start
            );
            return Ok(Outcome::Skipped);
        }

        let budget = self
            .budgets
            .create(NewBudget {
                template_id: template.id.clone(),
                account_id: template.account_id.clone(),
                category_id: template.category_id.clone(),
                amount_limit: template.amount_limit,
                period_start,
                period_end,
                note: template.note.clone(),
            })
            .await?;

        // Stamp only after a successful create; a failed create leaves the
        // template due so the next tick retries it.
        self.templates.mark_executed(&template.id, now).await?;
        debug!("Created budget {} from template {}", budget.id, template.id);
        Ok(Outcome::Created)
    }

    async fn run_once(&self, now: DateTime<Utc>) -> Result<RunStats> {
        let due = self.templates.get_due(now).await?;
        if due.is_empty() {
            debug!("No budget templates due");
            return Ok(RunStats::default());
        }
        info!("{} budget template(s) due", due.len());

        let mut stats = RunStats::default();
        for template in &due {
            match self.process_template(template, now).await {
                Ok(Outcome::Created) => stats.created += 1,
                Ok(Outcome::Skipped) => stats.skipped += 1,
                Err(e) => {
                    warn!("Budget template {} failed: {}", template.id, e);
                    stats.failed += 1;
                }
            }
        }
        Ok(stats)
    }
}

#[async_trait]
impl Job for BudgetGenerationJob {
    fn name(&self) -> &str {
        "budget-generation"
    }

    fn schedule(&self) -> &str {
        &self.schedule
    }

    async fn run(&self, now: DateTime<Utc>) -> anyhow::Result<()> {
        let stats = self.run_once(now).await?;
        info!(
            "Budget generation finished: {} created, {} skipped, {} failed",
            stats.created, stats.skipped, stats.failed
        );
        Ok(())
    }
}

/// Generates transactions from due transaction templates once a day.
pub struct TransactionGenerationJob {
    templates: Arc<dyn TransactionTemplateSource>,
    transactions: Arc<dyn TransactionStore>,
    schedule: String,
}

impl TransactionGenerationJob {
    pub fn new(
        templates: Arc<dyn TransactionTemplateSource>,
        transactions: Arc<dyn TransactionStore>,
        schedule: impl Into<String>,
    ) -> Self {
        Self {
            templates,
            transactions,
            schedule: schedule.into(),
        }
    }

    async fn process_template(
        &self,
        template: &TransactionTemplate,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        // The due date is derived from the count of occurrences generated so
        // far, not from "now", so re-evaluation lands on the same dates even
        // across restarts.
        let occurrences = self.transactions.count_for_template(&template.id).await?;
        let due_date =
            recurrence::next_due_date(template.recurrence, template.anchor_date, occurrences);
        if due_date > now.date_naive() {
            debug!(
                "Transaction template {} next occurrence {} is still ahead, skipping",
                template.id, due_date
            );
            return Ok(Outcome::Skipped);
        }

        let transaction = self
            .transactions
            .create(NewTransaction {
                template_id: template.id.clone(),
                account_id: template.account_id.clone(),
                category_id: template.category_id.clone(),
                amount: template.amount,
                date: due_date,
                note: template.note.clone(),
            })
            .await?;

        self.templates.mark_executed(&template.id, now).await?;
        debug!(
            "Created transaction {} from template {}",
            transaction.id, template.id
        );
        Ok(Outcome::Created)
    }

    async fn run_once(&self, now: DateTime<Utc>) -> Result<RunStats> {
        let due = self.templates.get_due(now).await?;
        if due.is_empty() {
            debug!("No transaction templates due");
            return Ok(RunStats::default());
        }
        info!("{} transaction template(s) due", due.len());

        let mut stats = RunStats::default();
        for template in &due {
            match self.process_template(template, now).await {
                Ok(Outcome::Created) => stats.created += 1,
                Ok(Outcome::Skipped) => stats.skipped += 1,
                Err(e) => {
                    warn!("Transaction template {} failed: {}", template.id, e);
                    stats.failed += 1;
                }
            }
        }
        Ok(stats)
    }
}

#[async_trait]
impl Job for TransactionGenerationJob {
    fn name(&self) -> &str {
        "transaction-generation"
    }

    fn schedule(&self) -> &str {
        &self.schedule
    }

    async fn run(&self, now: DateTime<Utc>) -> anyhow::Result<()> {
        let stats = self.run_once(now).await?;
        info!(
            "Transaction generation finished: {} created, {} skipped, {} failed",
            stats.created, stats.skipped, stats.failed
        );
        Ok(())
    }
}
