
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

// Recurrence cadence for generation templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
	#[default]
	None,
	Weekly,
	Monthly,
	Yearly,
}

impl Recurrence {
	pub fn from_str(s: &str) -> Option<Recurrence> {
		match s.to_ascii_lowercase().as_str() {
			"none" | "" => Some(Recurrence::None),
			"weekly" | "week" => Some(Recurrence::Weekly),
			"monthly" | "month" => Some(Recurrence::Monthly),
			"yearly" | "year" | "annual" => Some(Recurrence::Yearly),
			_ => None,
		}
	}

	/// A template with cadence `None` never generates records.
	pub fn is_recurring(&self) -> bool {
		!matches!(self, Recurrence::None)
	}
}

// Template models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetTemplate {
	pub id: String,
	#[serde(default)]
	pub account_id: Option<String>,
	#[serde(default)]
	pub category_id: Option<String>,
	pub amount_limit: f64,
	#[serde(default)]
	pub recurrence: Recurrence,
	pub anchor_date: NaiveDate,
	#[serde(default)]
	pub end_date: Option<NaiveDate>,
	#[serde(default)]
	pub last_executed_at: Option<DateTime<Utc>>,
	#[serde(default)]
	pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionTemplate {
	pub id: String,
	#[serde(default)]
	pub account_id: Option<String>,
	#[serde(default)]
	pub category_id: Option<String>,
	pub amount: f64,
	#[serde(default)]
	pub recurrence: Recurrence,
	pub anchor_date: NaiveDate,
	#[serde(default)]
	pub end_date: Option<NaiveDate>,
	#[serde(default)]
	pub last_executed_at: Option<DateTime<Utc>>,
	#[serde(default)]
	pub note: Option<String>,
}

impl BudgetTemplate {
	/// A template must point at an account or a category (or both).
	pub fn has_target(&self) -> bool {
		self.account_id.is_some() || self.category_id.is_some()
	}
}

impl TransactionTemplate {
	pub fn has_target(&self) -> bool {
		self.account_id.is_some() || self.category_id.is_some()
	}
}

// Generated records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
	pub id: String,
	pub template_id: String,
	#[serde(default)]
	pub account_id: Option<String>,
	#[serde(default)]
	pub category_id: Option<String>,
	pub amount_limit: f64,
	pub period_start: NaiveDateTime,
	pub period_end: NaiveDateTime,
	#[serde(default)]
	pub note: Option<String>,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
	pub id: String,
	pub template_id: String,
	#[serde(default)]
	pub account_id: Option<String>,
	#[serde(default)]
	pub category_id: Option<String>,
	pub amount: f64,
	pub date: NaiveDate,
	#[serde(default)]
	pub note: Option<String>,
	pub created_at: DateTime<Utc>,
}

// Creation inputs (id and created_at are assigned by the store)
#[derive(Debug, Clone)]
pub struct NewBudget {
	pub template_id: String,
	pub account_id: Option<String>,
	pub category_id: Option<String>,
	pub amount_limit: f64,
	pub period_start: NaiveDateTime,
	pub period_end: NaiveDateTime,
	pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
	pub template_id: String,
	pub account_id: Option<String>,
	pub category_id: Option<String>,
	pub amount: f64,
	pub date: NaiveDate,
	pub note: Option<String>,
}

// Service settings (settings.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
	#[serde(default = "default_database_file")]
	pub database_file: String,
	#[serde(default = "default_budget_schedule")]
	pub budget_schedule: String,
	#[serde(default = "default_transaction_schedule")]
	pub transaction_schedule: String,
	#[serde(default = "default_shutdown_timeout_secs")]
	pub shutdown_timeout_secs: u64,
}

fn default_database_file() -> String {
	"database/database.json".to_string()
}

fn default_budget_schedule() -> String {
	"06:00".to_string()
}

fn default_transaction_schedule() -> String {
	"06:30".to_string()
}

fn default_shutdown_timeout_secs() -> u64 {
	10
}

impl Default for Settings {
	fn default() -> Self {
		Settings {
			database_file: default_database_file(),
			budget_schedule: default_budget_schedule(),
			transaction_schedule: default_transaction_schedule(),
			shutdown_timeout_secs: default_shutdown_timeout_secs(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_recurrence_from_str() {
		assert_eq!(Recurrence::from_str("weekly"), Some(Recurrence::Weekly));
		assert_eq!(Recurrence::from_str("Monthly"), Some(Recurrence::Monthly));
		assert_eq!(Recurrence::from_str("year"), Some(Recurrence::Yearly));
		assert_eq!(Recurrence::from_str("none"), Some(Recurrence::None));
		assert_eq!(Recurrence::from_str(""), Some(Recurrence::None));
		assert_eq!(Recurrence::from_str("fortnightly"), None);
	}

	#[test]
	fn test_recurrence_is_recurring() {
		assert!(!Recurrence::None.is_recurring());
		assert!(Recurrence::Weekly.is_recurring());
		assert!(Recurrence::Monthly.is_recurring());
		assert!(Recurrence::Yearly.is_recurring());
	}

	#[test]
	fn test_settings_defaults_from_empty_json() {
		let settings: Settings = serde_json::from_str("{}").unwrap();
		assert_eq!(settings.database_file, "database/database.json");
		assert_eq!(settings.budget_schedule, "06:00");
		assert_eq!(settings.transaction_schedule, "06:30");
		assert_eq!(settings.shutdown_timeout_secs, 10);
	}

	#[test]
	fn test_template_has_target() {
		let mut template = BudgetTemplate {
			id: "1".to_string(),
			account_id: None,
			category_id: Some("groceries".to_string()),
			amount_limit: 250.0,
			recurrence: Recurrence::Monthly,
			anchor_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
			end_date: None,
			last_executed_at: None,
			note: None,
		};
		assert!(template.has_target());
		template.category_id = None;
		assert!(!template.has_target());

		let transaction_template = TransactionTemplate {
			id: "2".to_string(),
			account_id: Some("checking".to_string()),
			category_id: None,
			amount: 50.0,
			recurrence: Recurrence::Weekly,
			anchor_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
			end_date: None,
			last_executed_at: None,
			note: None,
		};
		assert!(transaction_template.has_target());
	}
}
