// src/alerts.rs

use crate::ledger::{Ledger, StockRecord, fold};

/// Rows at or below this quantity count as low stock unless configured otherwise.
pub const DEFAULT_LOW_STOCK_THRESHOLD: u32 = 3;

/// The single warning worth showing for a ledger snapshot.
#[derive(Debug, PartialEq)]
pub enum StockAlert<'a> {
    OutOfStock(Vec<&'a StockRecord>),
    LowStock(Vec<&'a StockRecord>),
}

pub fn out_of_stock(ledger: &Ledger) -> Vec<&StockRecord> {
    ledger.records().iter().filter(|r| r.quantity == 0).collect()
}

pub fn low_stock(ledger: &Ledger, threshold: u32) -> Vec<&StockRecord> {
    ledger
        .records()
        .iter()
        .filter(|r| r.quantity > 0 && r.quantity <= threshold)
        .collect()
}

/// Products whose combined stock is at or below `threshold`, one entry per
/// product name in first-seen order.
pub fn total_low(ledger: &Ledger, threshold: u32) -> Vec<(String, u64)> {
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for record in ledger.records() {
        let name = fold(&record.product_name);
        if seen.contains(&name) {
            continue;
        }
        seen.push(name);
        if record.total_across_locations <= u64::from(threshold) {
            out.push((record.product_name.clone(), record.total_across_locations));
        }
    }
    out
}

/// Out-of-stock wins over low-stock so only the stronger signal is shown.
pub fn surface(ledger: &Ledger, threshold: u32) -> Option<StockAlert<'_>> {
    let out = out_of_stock(ledger);
    if !out.is_empty() {
        return Some(StockAlert::OutOfStock(out));
    }
    let low = low_stock(ledger, threshold);
    if !low.is_empty() {
        return Some(StockAlert::LowStock(low));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Location;
    use crate::ledger::tests::record;

    fn ledger() -> Ledger {
        let mut ledger = Ledger::from_records(vec![
            record("Omega3", "", Location::Warehouse, 2),
            record("Omega3", "", Location::Store, 1),
            record("Zinc", "", Location::Shelf, 0),
            record("Magnesium", "Solgar", Location::Shelf, 40),
        ]);
        ledger.recompute_all_totals();
        ledger
    }

    #[test]
    fn buckets_are_disjoint() {
        let ledger = ledger();
        let out: Vec<&str> = out_of_stock(&ledger).iter().map(|r| r.product_name.as_str()).collect();
        assert_eq!(out, vec!["Zinc"]);
        assert_eq!(low_stock(&ledger, 3).len(), 2);
        assert!(low_stock(&ledger, 0).is_empty());
    }

    #[test]
    fn total_low_is_deduplicated_by_name() {
        let low = total_low(&ledger(), DEFAULT_LOW_STOCK_THRESHOLD);
        assert_eq!(low, vec![("Omega3".to_string(), 3), ("Zinc".to_string(), 0)]);
    }

    #[test]
    fn out_of_stock_takes_precedence() {
        let ledger = ledger();
        assert!(matches!(surface(&ledger, 3), Some(StockAlert::OutOfStock(rows)) if rows.len() == 1));

        let healthy = Ledger::from_records(vec![record("Zinc", "", Location::Shelf, 2)]);
        assert!(matches!(surface(&healthy, 3), Some(StockAlert::LowStock(_))));
        assert_eq!(surface(&healthy, 1), None);
    }
}
