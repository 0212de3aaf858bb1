// src/identity/catalog.rs

use super::fuzzy::weighted_ratio;
use crate::ledger::{Category, fold};

/// Minimum weighted-ratio score for a brand guess to be accepted.
pub const DEFAULT_BRAND_THRESHOLD: f64 = 70.0;

/// Supplement brands recognised out of the box.
pub const SUPPLEMENT_BRANDS: &[&str] = &[
    "Solgar",
    "NOW",
    "NOW Foods",
    "HealthAid",
    "Lamberts",
    "Lanes",
    "Vitabiotics",
    "Nature's Bounty",
    "Power Health",
    "Superfoods Nature's Best",
    "A.Vogel",
    "Quest",
    "Thorne",
    "Jarrow",
    "Doctor's Best",
    "Swisse",
    "Garden of Life",
    "Optimum Nutrition",
    "Centrum",
    "Pharmaton",
    "EVIOL",
    "InterMed",
];

/// Dosage units, forms and actives that mark a label as a supplement.
pub const SUPPLEMENT_KEYWORDS: &[&str] = &[
    "vitamin",
    "omega",
    "mg",
    "iu",
    "caps",
    "tablets",
    "softgels",
    "probiotic",
    "collagen",
    "zinc",
    "vit",
    "b-complex",
    "d3",
    "c 1000",
    "e 400",
    "magnesium",
    "curcumin",
    "turmeric",
    "coq10",
    "glucosamine",
    "chondroitin",
    "hyaluronic",
];

#[derive(Debug, Clone, PartialEq)]
pub struct BrandMatch {
    pub brand: String,
    pub score: f64,
}

/// Brand and category policy, kept outside the ledger engine so it can be
/// swapped or stubbed.
pub trait Classifier {
    fn guess_brand(&self, text: &str) -> Option<BrandMatch>;
    fn guess_category(&self, text: &str, brand: Option<&str>) -> Option<Category>;
}

/// Fixed-catalog classifier: fuzzy brand lookup plus keyword scan.
#[derive(Debug, Clone)]
pub struct CatalogClassifier {
    brands: Vec<String>,
    keywords: Vec<String>,
    threshold: f64,
}

impl Default for CatalogClassifier {
    fn default() -> Self {
        Self {
            brands: SUPPLEMENT_BRANDS.iter().map(|b| b.to_string()).collect(),
            keywords: SUPPLEMENT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            threshold: DEFAULT_BRAND_THRESHOLD,
        }
    }
}

impl CatalogClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append brands not already in the catalog (case-insensitive).
    pub fn with_extra_brands<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for brand in extra {
            let brand: String = brand.into();
            let brand = brand.trim().to_string();
            if brand.is_empty() || self.is_known_brand(&brand) {
                continue;
            }
            self.brands.push(brand);
        }
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn brands(&self) -> &[String] {
        &self.brands
    }

    pub fn is_known_brand(&self, brand: &str) -> bool {
        let brand = fold(brand);
        self.brands.iter().any(|b| fold(b) == brand)
    }
}

impl Classifier for CatalogClassifier {
    fn guess_brand(&self, text: &str) -> Option<BrandMatch> {
        let mut best: Option<BrandMatch> = None;
        for brand in &self.brands {
            let score = weighted_ratio(text, brand);
            // strict comparison keeps the earlier catalog entry on ties
            if best.as_ref().is_none_or(|b| score > b.score) {
                best = Some(BrandMatch {
                    brand: brand.clone(),
                    score,
                });
            }
        }
        best.filter(|m| m.score >= self.threshold)
    }

    fn guess_category(&self, text: &str, brand: Option<&str>) -> Option<Category> {
        if brand.is_some_and(|b| self.is_known_brand(b)) {
            return Some(Category::Supplement);
        }
        let text = text.to_lowercase();
        self.keywords
            .iter()
            .any(|kw| text.contains(kw.as_str()))
            .then_some(Category::Supplement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brand_found_in_label() {
        let m = CatalogClassifier::new()
            .guess_brand("Solgar Vitamin C 1000")
            .unwrap();
        assert_eq!(m.brand, "Solgar");
        assert!(m.score >= DEFAULT_BRAND_THRESHOLD);
    }

    #[test]
    fn weak_matches_are_dropped() {
        assert_eq!(CatalogClassifier::new().guess_brand("zzz qqq 42"), None);
        assert_eq!(CatalogClassifier::new().guess_brand(""), None);
    }

    #[test]
    fn extra_brands_join_the_catalog() {
        let classifier = CatalogClassifier::new().with_extra_brands(["Korres", "solgar", " "]);
        assert_eq!(classifier.brands().len(), SUPPLEMENT_BRANDS.len() + 1);
        assert_eq!(classifier.guess_brand("KORRES").map(|m| m.brand), Some("Korres".to_string()));
    }

    #[test]
    fn category_from_brand_then_keywords() {
        let c = CatalogClassifier::new();
        assert_eq!(c.guess_category("anything", Some("thorne")), Some(Category::Supplement));
        assert_eq!(c.guess_category("Fish Oil 60 Softgels", None), Some(Category::Supplement));
        assert_eq!(c.guess_category("Hand cream", Some("Korres")), None);
    }
}
