// src/display.rs

use clap::ValueEnum;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;

use crate::alerts::StockAlert;
use crate::ledger::{Action, Ledger, Location, StockRecord};
use crate::period_log::{PeriodChangeEntry, PeriodLabel};
use crate::reconcile::Outcome;

pub fn location_label(location: Location) -> String {
    format!("{} ({})", location.code(), location.name())
}

/// Accepts `"0"`, `"warehouse"`, or a legacy label such as `"0 (Αποθήκη)"`.
pub fn parse_location(s: &str) -> Option<Location> {
    let s = s.trim();
    if let Some(loc) = Location::ALL
        .iter()
        .copied()
        .find(|l| l.name().eq_ignore_ascii_case(s))
    {
        return Some(loc);
    }
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<i64>().ok().and_then(Location::from_code)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StockFilter {
    All,
    /// Quantity at or below the threshold, zero included.
    Low,
    /// Quantity exactly zero.
    Out,
}

impl StockFilter {
    pub fn select<'a>(self, ledger: &'a Ledger, threshold: u32) -> Vec<&'a StockRecord> {
        ledger
            .records()
            .iter()
            .filter(|r| match self {
                StockFilter::All => true,
                StockFilter::Low => r.quantity <= threshold,
                StockFilter::Out => r.quantity == 0,
            })
            .collect()
    }
}

/// Serializable view of one row.
#[derive(Debug, Serialize)]
pub struct RecordView<'a> {
    pub product_name: &'a str,
    pub brand: &'a str,
    pub category: &'a str,
    pub location: String,
    pub quantity: u32,
    pub quantity_kind: &'a str,
    pub last_updated: String,
    pub total_across_locations: u64,
    pub daily_change: i64,
}

impl<'a> From<&'a StockRecord> for RecordView<'a> {
    fn from(r: &'a StockRecord) -> Self {
        Self {
            product_name: &r.product_name,
            brand: &r.brand,
            category: r.category.map(|c| c.as_str()).unwrap_or(""),
            location: location_label(r.location),
            quantity: r.quantity,
            quantity_kind: r.quantity_kind.as_str(),
            last_updated: r.last_updated.format(&Rfc3339).unwrap_or_default(),
            total_across_locations: r.total_across_locations,
            daily_change: r.daily_change,
        }
    }
}

const HEADERS: [&str; 8] = [
    "Product", "Brand", "Category", "Location", "Qty", "Kind", "Total", "Change",
];

/// Left-aligned text table, one line per row.
pub fn render_table(records: &[&StockRecord]) -> String {
    let rows: Vec<[String; 8]> = records
        .iter()
        .map(|r| {
            [
                r.product_name.clone(),
                r.brand.clone(),
                r.category.map(|c| c.as_str()).unwrap_or("").to_string(),
                location_label(r.location),
                r.quantity.to_string(),
                r.quantity_kind.as_str().to_string(),
                r.total_across_locations.to_string(),
                format!("{:+}", r.daily_change),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(widths)
            .map(|(c, w)| format!("{c:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![line(HEADERS.to_vec())];
    for row in &rows {
        out.push(line(row.iter().map(String::as_str).collect()));
    }
    out.join("\n")
}

pub fn format_outcome(outcome: &Outcome) -> String {
    let verb = match (outcome.action, outcome.created) {
        (Action::Add, true) => "created",
        (Action::Add, false) => "added",
        (Action::Remove, _) => "removed",
    };
    format!(
        "{verb} {}: {} -> {} ({:+}), total {}",
        outcome.key, outcome.previous_quantity, outcome.new_quantity, outcome.daily_change, outcome.total_after
    )
}

pub fn format_alert(alert: &StockAlert<'_>) -> String {
    let (title, rows) = match alert {
        StockAlert::OutOfStock(rows) => ("Out of stock", rows),
        StockAlert::LowStock(rows) => ("Low stock", rows),
    };
    let names: Vec<String> = rows
        .iter()
        .map(|r| format!("{} @ {}", r.product_name, location_label(r.location)))
        .collect();
    format!("{title}: {}", names.join(", "))
}

pub fn render_period(period: PeriodLabel, entries: &[&PeriodChangeEntry]) -> String {
    if entries.is_empty() {
        return format!("No stock movement recorded for {period}");
    }
    let width = entries
        .iter()
        .map(|e| e.product_name.chars().count())
        .max()
        .unwrap_or(0);
    let mut out = vec![format!("Net change for {period}")];
    for e in entries {
        out.push(format!("  {:<width$}  {:+}", e.product_name, e.net_change));
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerKey;
    use crate::ledger::tests::record;
    use time::Month;

    #[test]
    fn locations_parse_from_every_spelling() {
        assert_eq!(parse_location("2"), Some(Location::Shelf));
        assert_eq!(parse_location("store"), Some(Location::Store));
        assert_eq!(parse_location("0 (Αποθήκη)"), Some(Location::Warehouse));
        assert_eq!(parse_location(&location_label(Location::Shelf)), Some(Location::Shelf));
        assert_eq!(parse_location("9"), None);
        assert_eq!(parse_location("attic"), None);
    }

    #[test]
    fn filters_select_expected_rows() {
        let ledger = Ledger::from_records(vec![
            record("Zinc", "", Location::Shelf, 0),
            record("Omega3", "", Location::Store, 3),
            record("Biotin", "", Location::Store, 12),
        ]);
        assert_eq!(StockFilter::All.select(&ledger, 3).len(), 3);
        assert_eq!(StockFilter::Low.select(&ledger, 3).len(), 2);
        assert_eq!(StockFilter::Out.select(&ledger, 3).len(), 1);
    }

    #[test]
    fn table_has_header_and_aligned_rows() {
        let zinc = record("Zinc", "Solgar", Location::Shelf, 5);
        let table = render_table(&[&zinc]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Product"));
        assert!(lines[1].starts_with("Zinc     Solgar"));
        assert!(lines[1].contains("2 (Shelf)"));
    }

    #[test]
    fn outcome_line_reads_naturally() {
        let outcome = Outcome {
            key: LedgerKey::new("VitaminC", "Solgar", Location::Warehouse),
            action: Action::Add,
            previous_quantity: 10,
            new_quantity: 15,
            created: false,
            daily_change: 5,
            total_after: 15,
            warnings: vec![],
        };
        assert_eq!(
            format_outcome(&outcome),
            "added 'VitaminC' (Solgar) @ Warehouse: 10 -> 15 (+5), total 15"
        );
    }

    #[test]
    fn empty_period_has_a_message() {
        let march = PeriodLabel::new(2025, Month::March);
        assert_eq!(render_period(march, &[]), "No stock movement recorded for March 2025");
    }
}
