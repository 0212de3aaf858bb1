// src/identity/mod.rs

pub mod catalog;
pub mod fuzzy;

pub use catalog::{CatalogClassifier, Classifier};

use crate::error::Warning;
use crate::ledger::{Category, QuantityKind};

/// What a label resolves to before it is keyed into the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductIdentity {
    pub name: String,
    pub brand: Option<String>,
    /// Present when the brand came from the catalog rather than the operator.
    pub brand_score: Option<f64>,
    /// Always set; falls back to [`Category::Other`].
    pub category: Option<Category>,
    /// True when neither the operator nor the classifier supplied the category.
    pub category_defaulted: bool,
}

impl ProductIdentity {
    pub fn brand_or_blank(&self) -> &str {
        self.brand.as_deref().unwrap_or("")
    }

    /// The category to write over a stored one: only typed or guessed values.
    pub fn category_update(&self) -> Option<Category> {
        if self.category_defaulted {
            None
        } else {
            self.category
        }
    }
}

/// Values typed by the operator; each one present beats the guess.
/// An empty `brand` means "explicitly unbranded".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManualOverride {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub category: Option<Category>,
}

/// The longest recognised fragment, taken to be the full product name
/// rather than a stray unit or count. Ties keep the first fragment.
pub fn pick_candidate(fragments: &[String]) -> Option<&str> {
    let mut best: Option<&str> = None;
    for fragment in fragments {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            continue;
        }
        if best.is_none_or(|b| fragment.chars().count() > b.chars().count()) {
            best = Some(fragment);
        }
    }
    best
}

/// Turn recognised or typed text into a product identity. Never fails: an
/// unresolvable brand is left empty and an unresolvable category becomes
/// [`Category::Other`].
pub fn resolve(raw_text: &str, manual: &ManualOverride, classifier: &dyn Classifier) -> ProductIdentity {
    let name = manual
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| raw_text.trim())
        .to_string();

    let (brand, brand_score) = match manual.brand.as_deref().map(str::trim) {
        Some("") => (None, None),
        Some(typed) => (Some(typed.to_string()), None),
        None => match classifier.guess_brand(raw_text) {
            Some(m) => (Some(m.brand), Some(m.score)),
            None => (None, None),
        },
    };

    let category = manual
        .category
        .or_else(|| classifier.guess_category(raw_text, brand.as_deref()));
    let category_defaulted = category.is_none();

    ProductIdentity {
        name,
        brand,
        brand_score,
        category: Some(category.unwrap_or(Category::Other)),
        category_defaulted,
    }
}

/// A pack count read off recognised text. Always labelled estimated until
/// the operator settles it.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantityEstimate {
    pub value: u32,
    pub warning: Option<Warning>,
}

/// The operator's answer to "is this quantity right?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Corrected(u32),
    Unsure,
}

impl QuantityEstimate {
    pub fn settle(&self, confirmation: Confirmation) -> (u32, QuantityKind) {
        match confirmation {
            Confirmation::Confirmed => (self.value, QuantityKind::Exact),
            Confirmation::Corrected(value) => (value, QuantityKind::Exact),
            Confirmation::Unsure => (self.value, QuantityKind::Estimated),
        }
    }
}

/// Largest plain integer token across all fragments; printed pack counts
/// tend to be the biggest number on the box. Falls back to 1 when there is
/// no number or the largest one is zero.
pub fn estimate_quantity(fragments: &[String]) -> QuantityEstimate {
    let best = fragments
        .iter()
        .flat_map(|f| f.split_whitespace())
        .filter(|t| t.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|t| t.parse::<u32>().ok())
        .max();

    match best.filter(|&v| v > 0) {
        Some(value) => QuantityEstimate {
            value,
            warning: None,
        },
        None => QuantityEstimate {
            value: 1,
            warning: Some(Warning::Parse {
                context: fragments.join(" "),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::catalog::BrandMatch;

    fn frags(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    struct Fixed;

    impl Classifier for Fixed {
        fn guess_brand(&self, _text: &str) -> Option<BrandMatch> {
            Some(BrandMatch {
                brand: "Lamberts".into(),
                score: 88.0,
            })
        }

        fn guess_category(&self, _text: &str, brand: Option<&str>) -> Option<Category> {
            brand.map(|_| Category::Supplement)
        }
    }

    #[test]
    fn longest_fragment_wins() {
        let lines = frags(&["60", "Solgar Vitamin C 1000", "  ", "Tablets"]);
        assert_eq!(pick_candidate(&lines), Some("Solgar Vitamin C 1000"));
        assert_eq!(pick_candidate(&frags(&["ab", "cd"])), Some("ab"));
        assert_eq!(pick_candidate(&[]), None);
    }

    #[test]
    fn guesses_fill_in_when_nothing_typed() {
        let id = resolve(" Omega 3 Fish Oil ", &ManualOverride::default(), &Fixed);
        assert_eq!(id.name, "Omega 3 Fish Oil");
        assert_eq!(id.brand.as_deref(), Some("Lamberts"));
        assert_eq!(id.brand_score, Some(88.0));
        assert_eq!(id.category, Some(Category::Supplement));
    }

    #[test]
    fn typed_values_override_guesses() {
        let manual = ManualOverride {
            name: Some("Fish Oil".into()),
            brand: Some("".into()),
            category: Some(Category::Medicine),
        };
        let id = resolve("garbled ocr", &manual, &Fixed);
        assert_eq!(id.name, "Fish Oil");
        assert_eq!(id.brand, None);
        assert_eq!(id.brand_or_blank(), "");
        assert_eq!(id.category, Some(Category::Medicine));
        assert_eq!(id.category_update(), Some(Category::Medicine));
    }

    #[test]
    fn real_catalog_defaults_unknowns_to_other() {
        let id = resolve("Hand cream", &ManualOverride::default(), &CatalogClassifier::new());
        assert_eq!(id.brand, None);
        assert_eq!(id.category, Some(Category::Other));
        assert!(id.category_defaulted);
        assert_eq!(id.category_update(), None);
    }

    #[test]
    fn estimate_takes_the_largest_count() {
        let est = estimate_quantity(&frags(&["Solgar 1000 mg", "60 Tablets", "x2"]));
        assert_eq!(est.value, 1000);
        assert_eq!(est.warning, None);
        assert_eq!(est.settle(Confirmation::Unsure), (1000, QuantityKind::Estimated));
        assert_eq!(est.settle(Confirmation::Confirmed), (1000, QuantityKind::Exact));
        assert_eq!(est.settle(Confirmation::Corrected(60)), (60, QuantityKind::Exact));
    }

    #[test]
    fn estimate_defaults_to_one_with_warning() {
        let est = estimate_quantity(&frags(&["Vitamin D3", "softgels"]));
        assert_eq!(est.value, 1);
        assert!(matches!(est.warning, Some(Warning::Parse { .. })));
    }

    #[test]
    fn zero_count_is_treated_as_unreadable() {
        let est = estimate_quantity(&frags(&["Hand cream", "0"]));
        assert_eq!(est.value, 1);
        assert!(matches!(est.warning, Some(Warning::Parse { .. })));
        assert_eq!(est.settle(Confirmation::Unsure), (1, QuantityKind::Estimated));
    }
}
