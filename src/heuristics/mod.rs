// src/heuristics/mod.rs

mod lines;

use crate::error::Warning;
use crate::identity::Classifier;
use crate::ledger::{Action, Category, LedgerKey, Location, QuantityKind};
use crate::reconcile::StockRequest;

/// A single product line read off an invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceLine {
    pub product_name: String,
    pub brand: Option<String>,
    pub category: Category,
    pub quantity: u32,
    pub quantity_kind: QuantityKind,
    pub warning: Option<Warning>,
}

/// Everything recognised in one invoice's text.
#[derive(Debug, Clone, Default)]
pub struct InvoiceData {
    pub lines: Vec<InvoiceLine>,
    /// Text lines that looked like products but could not be split.
    pub skipped: usize,
}

impl InvoiceData {
    /// Lines parsed vs lines that carried a product marker.
    pub fn coverage(&self) -> (usize, usize) {
        (self.lines.len(), self.lines.len() + self.skipped)
    }

    /// One Add per product line, all received at `location`.
    pub fn requests(&self, location: Location) -> Vec<StockRequest> {
        self.lines
            .iter()
            .map(|line| StockRequest {
                key: LedgerKey::new(
                    line.product_name.as_str(),
                    line.brand.as_deref().unwrap_or(""),
                    location,
                ),
                action: Action::Add,
                quantity: line.quantity,
                quantity_kind: line.quantity_kind,
                category: Some(line.category),
            })
            .collect()
    }
}

/// Pull product lines out of raw invoice text.
pub fn extract_invoice(text: &str, classifier: &dyn Classifier) -> InvoiceData {
    lines::extract(text, classifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::CatalogClassifier;
    use crate::ledger::Ledger;
    use crate::period_log::{PeriodLabel, PeriodLog};
    use crate::reconcile::commit;
    use time::Month;
    use time::macros::datetime;

    #[test]
    fn repeated_lines_merge_into_one_row() {
        let text = "Solgar Zinc 50mg 2pcs\nSolgar Zinc 50mg x3\n";
        let data = extract_invoice(text, &CatalogClassifier::new());
        let requests = data.requests(Location::Warehouse);
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.action == Action::Add));

        let march = PeriodLabel::new(2025, Month::March);
        let at = datetime!(2025-03-12 10:00 UTC);
        let (mut ledger, mut log) = (Ledger::new(), PeriodLog::new());
        for request in &requests {
            let done = commit(&ledger, &log, request, at, march).unwrap();
            ledger = done.ledger;
            log = done.log;
        }

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.records()[0].quantity, 5);
        assert_eq!(ledger.records()[0].brand, "Solgar");
        assert_eq!(log.entries_for_period(march)[0].net_change, 5);
    }

    #[test]
    fn text_without_markers_yields_nothing() {
        let data = extract_invoice("Thank you for your order\nTotal 42.00", &CatalogClassifier::new());
        assert!(data.lines.is_empty());
        assert!(data.requests(Location::Warehouse).is_empty());
    }
}
