use std::path::Path;

use clap::Subcommand;
use lifeboard_core::recurrence::transaction::{
    sweep_recurring_transactions, Transaction, TransactionKind, TransactionRecurrence,
};
use lifeboard_core::storage::store::{self, EntityFilter, EntityKind};
use lifeboard_core::Config;
use serde_json::json;

use super::{
    date_or_today, open_db, parse_optional_date, print_json, recurrence_from_args, CmdResult,
};

#[derive(Subcommand)]
pub enum TransactionAction {
    /// Record an income or expense
    Create {
        /// Amount in cents
        amount: i64,
        /// income or expense
        #[arg(long, default_value = "expense")]
        kind: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        description: Option<String>,
        /// Transaction date (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Repeat: daily, weekly, biweekly, monthly or yearly
        #[arg(long)]
        every: Option<String>,
        #[arg(long, default_value_t = 1)]
        interval: i64,
        /// Last date an occurrence may fall on (YYYY-MM-DD)
        #[arg(long)]
        until: Option<String>,
        /// First occurrence the sweep should create (default: one step after --date)
        #[arg(long)]
        next_date: Option<String>,
    },
    /// List transactions
    List {
        /// Only recurring templates
        #[arg(long)]
        recurring: bool,
    },
    /// Materialize every recurring transaction due on or before today
    Sweep {
        /// Sweep as of this date (YYYY-MM-DD, default: today)
        #[arg(long)]
        today: Option<String>,
    },
}

pub fn run(db_path: Option<&Path>, action: TransactionAction) -> CmdResult {
    let db = open_db(db_path)?;
    let config = Config::load()?;

    match action {
        TransactionAction::Create {
            amount,
            kind,
            category,
            description,
            date,
            every,
            interval,
            until,
            next_date,
        } => {
            let kind: TransactionKind = serde_json::from_value(json!(kind.to_lowercase()))?;
            let date = date_or_today(date.as_deref(), &config)?;
            let recurrence =
                match recurrence_from_args(every.as_deref(), interval, until.as_deref())? {
                    Some(pattern) => {
                        let next_date = match parse_optional_date(next_date.as_deref())? {
                            Some(d) => d,
                            None => pattern.next_after(date)?,
                        };
                        Some(TransactionRecurrence { pattern, next_date })
                    }
                    None => None,
                };

            let transaction = Transaction {
                id: String::new(),
                amount,
                kind,
                category,
                description,
                date,
                is_recurring: recurrence.is_some(),
                recurrence,
                recurring_source_id: None,
                created_at: None,
                updated_at: None,
            };
            let created: Transaction = store::create(&db, EntityKind::Transaction, &transaction)?;
            print_json(&created)?;
        }
        TransactionAction::List { recurring } => {
            let filter = if recurring {
                EntityFilter::all().field_eq("isRecurring", true)
            } else {
                EntityFilter::all()
            };
            let transactions: Vec<Transaction> =
                store::list(&db, EntityKind::Transaction, &filter)?;
            print_json(&transactions)?;
        }
        TransactionAction::Sweep { today } => {
            let today = date_or_today(today.as_deref(), &config)?;
            let result = sweep_recurring_transactions(&db, today)?;
            print_json(&result)?;
        }
    }
    Ok(())
}
