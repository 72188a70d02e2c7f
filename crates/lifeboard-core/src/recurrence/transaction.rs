//! Recurring transactions and the due-occurrence sweep.
//!
//! A recurring transaction is a template: it keeps `isRecurring = true` and a
//! `recurrence.nextDate`. Sweeping materializes a plain, non-recurring
//! transaction for every occurrence due on or before today and moves the
//! template's `nextDate` past today, so a second sweep on the same day finds
//! nothing to do.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use super::RecurrencePattern;
use crate::error::{Result, ValidationError};
use crate::storage::store::{self, EntityFilter, EntityKind, EntityStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

/// Recurrence rule of a template transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecurrence {
    #[serde(flatten)]
    pub pattern: RecurrencePattern,
    /// Date of the next occurrence to materialize
    pub next_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Amount in minor currency units (cents)
    pub amount: i64,
    pub kind: TransactionKind,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    pub date: NaiveDate,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<TransactionRecurrence>,
    /// Template this occurrence was materialized from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Whether the sweep on `today` selects this transaction.
    pub fn is_due(&self, today: NaiveDate) -> bool {
        match (self.is_recurring, &self.recurrence) {
            (true, Some(rec)) => {
                rec.next_date <= today && rec.pattern.end_date().map_or(true, |end| end >= today)
            }
            _ => false,
        }
    }

    fn occurrence_on(&self, date: NaiveDate) -> Transaction {
        Transaction {
            id: String::new(),
            amount: self.amount,
            kind: self.kind,
            category: self.category.clone(),
            description: self.description.clone(),
            date,
            is_recurring: false,
            recurrence: None,
            recurring_source_id: (!self.id.is_empty()).then(|| self.id.clone()),
            created_at: None,
            updated_at: None,
        }
    }
}

/// Occurrences owed by one template and its advanced copy.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPlan {
    pub occurrences: Vec<Transaction>,
    pub advanced: Transaction,
}

/// A template the sweep could not process.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedTemplate {
    pub template_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepResult {
    /// New non-recurring transactions
    pub created: Vec<Transaction>,
    /// Templates with their `nextDate` moved past today
    pub advanced: Vec<Transaction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedTemplate>,
}

/// Plan the occurrences owed by one due template.
///
/// A template several steps behind is caught up: one occurrence per missed
/// step, each dated at the `nextDate` it replaces.
pub fn plan_template(
    template: &Transaction,
    today: NaiveDate,
) -> Result<Option<SweepPlan>, ValidationError> {
    if !template.is_due(today) {
        return Ok(None);
    }
    let Some(mut recurrence) = template.recurrence else {
        return Ok(None);
    };

    let mut occurrences = Vec::new();
    while recurrence.next_date <= today {
        occurrences.push(template.occurrence_on(recurrence.next_date));
        recurrence.next_date = recurrence.pattern.next_after(recurrence.next_date)?;
    }

    let mut advanced = template.clone();
    advanced.recurrence = Some(recurrence);
    Ok(Some(SweepPlan {
        occurrences,
        advanced,
    }))
}

/// Pure sweep over a set of transactions.
///
/// Templates are independent: one that fails to advance is reported in
/// `skipped` and the rest proceed.
pub fn sweep_due_recurring_transactions(
    transactions: &[Transaction],
    today: NaiveDate,
) -> SweepResult {
    let mut result = SweepResult::default();
    for template in transactions {
        match plan_template(template, today) {
            Ok(Some(plan)) => {
                result.created.extend(plan.occurrences);
                result.advanced.push(plan.advanced);
            }
            Ok(None) => {}
            Err(e) => result.skipped.push(SkippedTemplate {
                template_id: template.id.clone(),
                error: e.to_string(),
            }),
        }
    }
    result
}

/// Sweep recurring transactions held by the store.
///
/// For each due template the occurrences are created, then the template's
/// advanced `recurrence` is written back, all in one unit. A template whose
/// writes fail is rolled back and reported in `skipped`.
///
/// # Errors
/// Fails only if the templates cannot be listed.
pub fn sweep_recurring_transactions<S>(store: &S, today: NaiveDate) -> Result<SweepResult>
where
    S: EntityStore + ?Sized,
{
    let templates: Vec<Transaction> = store::list(
        store,
        EntityKind::Transaction,
        &EntityFilter::all().field_eq("isRecurring", true),
    )?;
    debug!(count = templates.len(), %today, "sweeping recurring transactions");

    let mut result = SweepResult::default();
    for template in &templates {
        let plan = match plan_template(template, today) {
            Ok(Some(plan)) => plan,
            Ok(None) => continue,
            Err(e) => {
                warn!(
                    template_id = %template.id,
                    error = %e,
                    "cannot advance recurring transaction"
                );
                result.skipped.push(SkippedTemplate {
                    template_id: template.id.clone(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        match persist_plan(store, &plan) {
            Ok((created, advanced)) => {
                info!(
                    template_id = %template.id,
                    created = created.len(),
                    "recurring transaction materialized"
                );
                result.created.extend(created);
                result.advanced.push(advanced);
            }
            Err(e) => {
                warn!(template_id = %template.id, error = %e, "failed to persist sweep");
                result.skipped.push(SkippedTemplate {
                    template_id: template.id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    Ok(result)
}

/// Write one template's plan as a single unit.
///
/// Occurrences already stored for the template and date are not written
/// again, so a sweep retried after a partial write on a store without
/// transactions stays idempotent.
fn persist_plan<S>(store: &S, plan: &SweepPlan) -> Result<(Vec<Transaction>, Transaction)>
where
    S: EntityStore + ?Sized,
{
    store::atomically(store, || {
        let existing = materialized_dates(store, &plan.advanced.id)?;
        let mut created = Vec::with_capacity(plan.occurrences.len());
        for occurrence in &plan.occurrences {
            if existing.contains(&occurrence.date) {
                debug!(
                    template_id = %plan.advanced.id,
                    date = %occurrence.date,
                    "occurrence already stored"
                );
                continue;
            }
            created.push(store::create(store, EntityKind::Transaction, occurrence)?);
        }
        let advanced = store::update(
            store,
            EntityKind::Transaction,
            &plan.advanced.id,
            json!({ "recurrence": plan.advanced.recurrence }),
        )?;
        Ok((created, advanced))
    })
}

/// Dates of the occurrences already materialized from `template_id`.
fn materialized_dates<S>(store: &S, template_id: &str) -> Result<HashSet<NaiveDate>>
where
    S: EntityStore + ?Sized,
{
    if template_id.is_empty() {
        return Ok(HashSet::new());
    }
    let occurrences: Vec<Transaction> = store::list(
        store,
        EntityKind::Transaction,
        &EntityFilter::all().field_eq("recurringSourceId", template_id),
    )?;
    Ok(occurrences.into_iter().map(|t| t.date).collect())
}
