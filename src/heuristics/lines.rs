use super::{InvoiceData, InvoiceLine};
use crate::error::Warning;
use crate::identity::Classifier;
use crate::ledger::{Category, QuantityKind};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info_span};

// "Name ... 3 pcs", "Name ... 12pcs", "Name ... x3", "Name ... 3 τεμ"
static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)( pcs|\dpcs| x|τεμ)").expect("product marker pattern is valid")
});

/// Main extraction entry point: marker-anchored line scan.
pub fn extract(text: &str, classifier: &dyn Classifier) -> InvoiceData {
    let mut data = InvoiceData::default();
    for (idx, line) in text.lines().enumerate() {
        if !MARKER.is_match(line) {
            continue;
        }
        let span = info_span!("invoice_line", idx);
        let _guard = span.enter();

        match parse_line(line, classifier) {
            Some(item) => {
                debug!(product = %item.product_name, qty = item.quantity, "Product line");
                data.lines.push(item);
            }
            None => data.skipped += 1,
        }
    }
    data
}

/// Everything but the last token is the product; the last token is the count.
fn parse_line(line: &str, classifier: &dyn Classifier) -> Option<InvoiceLine> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let (&last, name_parts) = parts.split_last()?;
    if name_parts.is_empty() {
        return None;
    }

    let (quantity, quantity_kind, warning) = match parse_quantity(last) {
        Some(q) => (q, QuantityKind::Exact, None),
        None => (
            1,
            QuantityKind::Estimated,
            Some(Warning::Parse {
                context: last.to_string(),
            }),
        ),
    };

    let brand = classifier.guess_brand(line).map(|m| m.brand);
    let category = classifier
        .guess_category(line, brand.as_deref())
        .unwrap_or(Category::Other);

    Some(InvoiceLine {
        product_name: name_parts.join(" "),
        brand,
        category,
        quantity,
        quantity_kind,
        warning,
    })
}

/// Strip the unit markers and read what is left. Zero is not a usable count.
fn parse_quantity(token: &str) -> Option<u32> {
    let cleaned = token
        .to_lowercase()
        .replace("pcs", "")
        .replace("τεμ", "")
        .replace('x', "");
    cleaned.trim().parse::<u32>().ok().filter(|&q| q > 0)
}
