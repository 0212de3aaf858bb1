// src/ledger.rs

use std::fmt;

use time::OffsetDateTime;

/// Where a product is physically kept. The numeric codes are what the
/// operator types and what the store persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Location {
    Warehouse = 0,
    Store = 1,
    Shelf = 2,
}

impl Location {
    pub const ALL: [Location; 3] = [Location::Warehouse, Location::Store, Location::Shelf];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Location::Warehouse),
            1 => Some(Location::Store),
            2 => Some(Location::Shelf),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Location::Warehouse => "Warehouse",
            Location::Store => "Store",
            Location::Shelf => "Shelf",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityKind {
    Exact,
    Estimated,
}

impl QuantityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QuantityKind::Exact => "exact",
            QuantityKind::Estimated => "estimated",
        }
    }

    /// Accepts the stored form as well as the labels older sheets used.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "exact" | "ακριβής" => Some(QuantityKind::Exact),
            "estimated" | "estimate" | "εκτίμηση" => Some(QuantityKind::Estimated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Add,
    Remove,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Add => write!(f, "add"),
            Action::Remove => write!(f, "remove"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Supplement,
    Medicine,
    Cosmetic,
    Consumable,
    Other,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Supplement => "Supplement",
            Category::Medicine => "Medicine",
            Category::Cosmetic => "Cosmetic",
            Category::Consumable => "Consumable",
            Category::Other => "Other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "supplement" | "συμπλήρωμα" => Some(Category::Supplement),
            "medicine" | "φάρμακο" => Some(Category::Medicine),
            "cosmetic" | "καλλυντικό" => Some(Category::Cosmetic),
            "consumable" | "αναλώσιμο" => Some(Category::Consumable),
            "other" | "άλλο" => Some(Category::Other),
            _ => None,
        }
    }
}

/// Case-folded form used for every identity comparison.
pub fn fold(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Identifies one row of the ledger. Original casing is kept for display;
/// comparisons go through [`fold`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerKey {
    pub product_name: String,
    pub brand: String,
    pub location: Location,
}

impl LedgerKey {
    pub fn new(product_name: impl Into<String>, brand: impl Into<String>, location: Location) -> Self {
        Self {
            product_name: product_name.into().trim().to_string(),
            brand: brand.into().trim().to_string(),
            location,
        }
    }

    pub fn matches(&self, record: &StockRecord) -> bool {
        record.location == self.location
            && fold(&record.product_name) == fold(&self.product_name)
            && fold(&record.brand) == fold(&self.brand)
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.brand.is_empty() {
            write!(f, "'{}' @ {}", self.product_name, self.location.name())
        } else {
            write!(
                f,
                "'{}' ({}) @ {}",
                self.product_name,
                self.brand,
                self.location.name()
            )
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StockRecord {
    pub product_name: String,
    /// Empty means unbranded.
    pub brand: String,
    pub category: Option<Category>,
    pub location: Location,
    pub quantity: u32,
    pub quantity_kind: QuantityKind,
    pub last_updated: OffsetDateTime,
    pub total_across_locations: u64,
    pub daily_change: i64,
}

/// The full set of stock rows. Passed into and returned from the
/// reconciliation engine; there is no shared global copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    records: Vec<StockRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap rows as loaded from storage. Duplicated keys are kept as-is.
    pub fn from_records(records: Vec<StockRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[StockRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Indices of every row matching `key`, in storage order.
    pub fn matching(&self, key: &LedgerKey) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| key.matches(r))
            .map(|(i, _)| i)
            .collect()
    }

    /// The row `key` resolves to: the most recently updated match, the later
    /// row winning a timestamp tie.
    pub fn resolve(&self, key: &LedgerKey) -> Option<usize> {
        self.matching(key)
            .into_iter()
            .max_by(|&a, &b| {
                self.records[a]
                    .last_updated
                    .cmp(&self.records[b].last_updated)
                    .then(a.cmp(&b))
            })
    }

    pub fn get(&self, key: &LedgerKey) -> Option<&StockRecord> {
        self.resolve(key).map(|i| &self.records[i])
    }

    pub(crate) fn record_mut(&mut self, index: usize) -> &mut StockRecord {
        &mut self.records[index]
    }

    pub(crate) fn push(&mut self, record: StockRecord) -> usize {
        self.records.push(record);
        self.records.len() - 1
    }

    /// Sum of `quantity` over every row with this product name, regardless
    /// of brand or location.
    pub fn total_for(&self, product_name: &str) -> u64 {
        let name = fold(product_name);
        self.records
            .iter()
            .filter(|r| fold(&r.product_name) == name)
            .map(|r| u64::from(r.quantity))
            .sum()
    }

    /// Write the current total back into every row sharing `product_name`.
    pub fn recompute_totals_for(&mut self, product_name: &str) -> u64 {
        let total = self.total_for(product_name);
        let name = fold(product_name);
        for record in self
            .records
            .iter_mut()
            .filter(|r| fold(&r.product_name) == name)
        {
            record.total_across_locations = total;
        }
        total
    }

    pub fn recompute_all_totals(&mut self) {
        let mut names: Vec<String> = self.records.iter().map(|r| fold(&r.product_name)).collect();
        names.sort();
        names.dedup();
        for name in names {
            self.recompute_totals_for(&name);
        }
    }
}
