// src/reconcile.rs

use time::OffsetDateTime;
use tracing::warn;

use crate::error::{LedgerError, Warning};
use crate::ledger::{Action, Category, Ledger, LedgerKey, QuantityKind, StockRecord};
use crate::period_log::{PeriodLabel, PeriodLog};

/// One add/remove instruction against a ledger key.
#[derive(Debug, Clone, PartialEq)]
pub struct StockRequest {
    pub key: LedgerKey,
    pub action: Action,
    pub quantity: u32,
    pub quantity_kind: QuantityKind,
    /// Replaces the stored category when present; new rows default to Other.
    pub category: Option<Category>,
}

/// What a successful request did, for the caller to render or log.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub key: LedgerKey,
    pub action: Action,
    /// Zero when the request created the row.
    pub previous_quantity: u32,
    pub new_quantity: u32,
    pub created: bool,
    /// Signed movement of this row; equals the quantity for a new row.
    pub daily_change: i64,
    pub total_after: u64,
    pub warnings: Vec<Warning>,
}

/// Result of [`commit`]: the next ledger and change log plus the outcome.
#[derive(Debug, Clone)]
pub struct Committed {
    pub ledger: Ledger,
    pub log: PeriodLog,
    pub outcome: Outcome,
}

/// Reconcile one request against `ledger`, returning the updated copy.
///
/// Add on a missing key creates the row; Remove on a missing key fails with
/// [`LedgerError::NotFound`]. Removes clamp at zero. After the mutation the
/// per-product total is rewritten into every row sharing the product name.
/// When several rows share the key, the most recently updated one is used
/// and an [`Warning::AmbiguousMatch`] is attached to the outcome.
pub fn apply(
    ledger: &Ledger,
    request: &StockRequest,
    at: OffsetDateTime,
) -> Result<(Ledger, Outcome), LedgerError> {
    let key = &request.key;
    if request.quantity == 0 {
        return Err(LedgerError::InvalidQuantity { key: key.clone() });
    }

    let mut warnings = Vec::new();
    let rows = ledger.matching(key).len();
    if rows > 1 {
        warn!(key = %key, rows, "Duplicate ledger rows for one key; using most recent");
        warnings.push(Warning::AmbiguousMatch {
            key: key.clone(),
            rows,
        });
    }

    let mut next = ledger.clone();
    let (index, previous, created) = match (next.resolve(key), request.action) {
        (Some(index), action) => {
            let record = next.record_mut(index);
            let previous = record.quantity;
            record.quantity = match action {
                Action::Add => previous.saturating_add(request.quantity),
                Action::Remove => previous.saturating_sub(request.quantity),
            };
            record.quantity_kind = request.quantity_kind;
            if let Some(category) = request.category {
                record.category = Some(category);
            }
            record.last_updated = at;
            record.daily_change = i64::from(record.quantity) - i64::from(previous);
            (index, previous, false)
        }
        (None, Action::Add) => {
            let index = next.push(StockRecord {
                product_name: key.product_name.clone(),
                brand: key.brand.clone(),
                category: Some(request.category.unwrap_or(Category::Other)),
                location: key.location,
                quantity: request.quantity,
                quantity_kind: request.quantity_kind,
                last_updated: at,
                total_across_locations: 0,
                daily_change: i64::from(request.quantity),
            });
            (index, 0, true)
        }
        (None, Action::Remove) => {
            return Err(LedgerError::NotFound {
                key: key.clone(),
                action: Action::Remove,
            });
        }
    };

    let total_after = next.recompute_totals_for(&key.product_name);
    let record = &next.records()[index];
    let outcome = Outcome {
        key: key.clone(),
        action: request.action,
        previous_quantity: previous,
        new_quantity: record.quantity,
        created,
        daily_change: record.daily_change,
        total_after,
        warnings,
    };
    Ok((next, outcome))
}

/// [`apply`], then fold the resulting delta into the change log for
/// `period`. The delta is taken once, from the committed mutation.
pub fn commit(
    ledger: &Ledger,
    log: &PeriodLog,
    request: &StockRequest,
    at: OffsetDateTime,
    period: PeriodLabel,
) -> Result<Committed, LedgerError> {
    let (ledger, outcome) = apply(ledger, request, at)?;
    let mut log = log.clone();
    log.record_change(&outcome.key.product_name, outcome.daily_change, period);
    Ok(Committed {
        ledger,
        log,
        outcome,
    })
}
