use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// How a product id is taken out of a `buy_` / `cart_` action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum IdParsing {
    /// Everything after the command prefix: `buy_prod_watch` -> `prod_watch`.
    #[default]
    Exact,
    /// Second `_`-separated token only: `buy_prod_watch` -> `prod`. Every
    /// id containing an underscore becomes unreachable in this mode.
    FirstToken,
}

/// Price filter offered by the "shop by price" prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceBucket {
    Under100,
    From100To200,
    Over200,
    /// Unrecognised `price_` suffix. Matches the whole catalog.
    Any,
}

impl PriceBucket {
    fn from_suffix(suffix: &str) -> Self {
        match suffix {
            "under_100" => PriceBucket::Under100,
            "100_200" => PriceBucket::From100To200,
            "over_200" => PriceBucket::Over200,
            _ => PriceBucket::Any,
        }
    }

    /// Half-open `[min, max)` interval.
    pub fn bounds(self) -> (f64, f64) {
        match self {
            PriceBucket::Under100 => (0.0, 100.0),
            PriceBucket::From100To200 => (100.0, 200.0),
            PriceBucket::Over200 => (200.0, f64::INFINITY),
            PriceBucket::Any => (0.0, f64::INFINITY),
        }
    }

    pub fn contains(self, price: f64) -> bool {
        let (min, max) = self.bounds();
        price >= min && price < max
    }

    pub fn describe(self) -> &'static str {
        match self {
            PriceBucket::Under100 => "under $100",
            PriceBucket::From100To200 => "between $100 and $200",
            PriceBucket::Over200 => "over $200",
            PriceBucket::Any => "at any price",
        }
    }

    fn wire_suffix(self) -> &'static str {
        match self {
            PriceBucket::Under100 => "under_100",
            PriceBucket::From100To200 => "100_200",
            PriceBucket::Over200 => "over_200",
            PriceBucket::Any => "any",
        }
    }
}

/// A button press from the widget, parsed once at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ShowPriceRanges,
    Category(String),
    PriceRange(PriceBucket),
    Buy(String),
    Cart(String),
    ShowCategories,
    Featured,
    Unrecognized(String),
}

impl Action {
    /// Prefixes are checked in dispatch priority order; the first match owns
    /// the action.
    pub fn parse(raw: &str, ids: IdParsing) -> Self {
        if raw == "show_price_ranges" {
            return Action::ShowPriceRanges;
        }
        if let Some(category) = raw.strip_prefix("category_") {
            return Action::Category(category.to_string());
        }
        if let Some(suffix) = raw.strip_prefix("price_") {
            return Action::PriceRange(PriceBucket::from_suffix(suffix));
        }
        if raw.starts_with("buy_") {
            return Action::Buy(product_id(raw, "buy_", ids));
        }
        if raw.starts_with("cart_") {
            return Action::Cart(product_id(raw, "cart_", ids));
        }
        match raw {
            "show_products" | "show_categories" => Action::ShowCategories,
            "featured_products" => Action::Featured,
            other => Action::Unrecognized(other.to_string()),
        }
    }

    /// The string the widget sends for this action.
    pub fn as_wire(&self) -> String {
        match self {
            Action::ShowPriceRanges => "show_price_ranges".to_string(),
            Action::Category(name) => format!("category_{}", name),
            Action::PriceRange(bucket) => format!("price_{}", bucket.wire_suffix()),
            Action::Buy(id) => format!("buy_{}", id),
            Action::Cart(id) => format!("cart_{}", id),
            Action::ShowCategories => "show_categories".to_string(),
            Action::Featured => "featured_products".to_string(),
            Action::Unrecognized(raw) => raw.clone(),
        }
    }
}

fn product_id(raw: &str, prefix: &str, ids: IdParsing) -> String {
    match ids {
        IdParsing::Exact => raw[prefix.len()..].to_string(),
        IdParsing::FirstToken => raw.split('_').nth(1).unwrap_or_default().to_string(),
    }
}
