use serde::{Deserialize, Serialize};

use crate::logo::Logo;
use crate::store::ConfigError;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct InvoiceItem {
    pub id: ItemId,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub quantity: f64,
    pub price: f64,
    #[serde(default)]
    pub discount_percent: f64, // per-item, only applied when discounts are enabled
}

impl InvoiceItem {
    pub fn blank(id: ItemId) -> Self {
        Self {
            id,
            code: String::new(),
            description: String::new(),
            quantity: 1.0,
            price: 0.0,
            discount_percent: 0.0,
        }
    }

    /// Something that can actually be billed: described, with a positive quantity and price.
    pub fn is_billable(&self) -> bool {
        !self.description.trim().is_empty() && self.quantity > 0.0 && self.price > 0.0
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Issuer {
    pub company_name: String,
    #[serde(default)]
    pub company_address: String,
    #[serde(default)]
    pub company_tax_id: String,
    #[serde(default)]
    pub company_phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<Logo>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Recipient {
    pub client_name: String,
    #[serde(default)]
    pub client_address: String,
    #[serde(default)]
    pub client_tax_id: String,
    #[serde(default)]
    pub client_email: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaxCategory {
    Exempt,
    Reduced,
    #[default]
    General,
}

impl TaxCategory {
    pub const ALL: [TaxCategory; 3] = [TaxCategory::Exempt, TaxCategory::Reduced, TaxCategory::General];

    pub fn rate(self) -> f64 {
        match self {
            TaxCategory::Exempt => 0.0,
            TaxCategory::Reduced => 0.105,
            TaxCategory::General => 0.21,
        }
    }

    /// Percentage as printed on the invoice, e.g. "10.5".
    pub fn display_rate(self) -> &'static str {
        match self {
            TaxCategory::Exempt => "0",
            TaxCategory::Reduced => "10.5",
            TaxCategory::General => "21",
        }
    }

    pub fn from_rate(rate: f64) -> Option<Self> {
        Self::ALL.into_iter().find(|c| (c.rate() - rate).abs() < 1e-9)
    }
}

impl std::fmt::Display for TaxCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaxCategory::Exempt => "Exempt",
            TaxCategory::Reduced => "Reduced",
            TaxCategory::General => "General",
        };
        write!(f, "{} ({}%)", name, self.display_rate())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct TaxConfig {
    pub category: TaxCategory,
}

impl TaxConfig {
    /// Builds a config from an explicit pair, which must agree.
    pub fn checked(rate: f64, category: TaxCategory) -> Result<Self, ConfigError> {
        if TaxCategory::from_rate(rate) != Some(category) {
            return Err(ConfigError::TaxMismatch { rate, category });
        }
        Ok(Self { category })
    }

    pub fn rate(&self) -> f64 {
        self.category.rate()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct DiscountConfig {
    pub enabled: bool,
    #[serde(default)]
    pub global_percent: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PaymentMethod {
    pub method: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub percentage: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PaymentConfig {
    pub enabled: bool,
    pub methods: Vec<PaymentMethod>,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            methods: vec![PaymentMethod { method: "Cash".into(), amount: 0.0, percentage: 0.0 }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Code,
    Description,
    Quantity,
    UnitPrice,
    Discount,
    Total,
}

impl Column {
    /// Canonical left-to-right order of the items table.
    pub const ALL: [Column; 6] = [
        Column::Code,
        Column::Description,
        Column::Quantity,
        Column::UnitPrice,
        Column::Discount,
        Column::Total,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Column::Code => "Code",
            Column::Description => "Description",
            Column::Quantity => "Qty",
            Column::UnitPrice => "Price",
            Column::Discount => "Disc.",
            Column::Total => "Total",
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ColumnVisibility {
    pub code: bool,
    pub description: bool,
    pub quantity: bool,
    pub unit_price: bool,
    pub discount: bool,
    pub total: bool,
}

impl Default for ColumnVisibility {
    fn default() -> Self {
        Self {
            code: false,
            description: true,
            quantity: true,
            unit_price: true,
            discount: false,
            total: true,
        }
    }
}

impl ColumnVisibility {
    fn flag_mut(&mut self, column: Column) -> &mut bool {
        match column {
            Column::Code => &mut self.code,
            Column::Description => &mut self.description,
            Column::Quantity => &mut self.quantity,
            Column::UnitPrice => &mut self.unit_price,
            Column::Discount => &mut self.discount,
            Column::Total => &mut self.total,
        }
    }

    pub fn is_visible(&self, column: Column) -> bool {
        match column {
            Column::Code => self.code,
            Column::Description => self.description,
            Column::Quantity => self.quantity,
            Column::UnitPrice => self.unit_price,
            Column::Discount => self.discount,
            Column::Total => self.total,
        }
    }

    pub fn set(&mut self, column: Column, visible: bool) {
        *self.flag_mut(column) = visible;
    }

    pub fn toggle(&mut self, column: Column) {
        let flag = self.flag_mut(column);
        *flag = !*flag;
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Template {
    #[default]
    Classic,
    Modern,
    Minimal,
}

impl Template {
    pub const ALL: [Template; 3] = [Template::Classic, Template::Modern, Template::Minimal];
}

impl std::fmt::Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Template::Classic => "Classic",
            Template::Modern => "Modern",
            Template::Minimal => "Minimal",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tax_category_rates_round_trip() {
        for category in TaxCategory::ALL {
            assert_eq!(TaxCategory::from_rate(category.rate()), Some(category));
        }
        assert_eq!(TaxCategory::from_rate(0.19), None);
    }

    #[test]
    fn default_columns_hide_code_and_discount() {
        let columns = ColumnVisibility::default();
        let visible: Vec<Column> = Column::ALL.into_iter().filter(|c| columns.is_visible(*c)).collect();
        assert_eq!(
            visible,
            vec![Column::Description, Column::Quantity, Column::UnitPrice, Column::Total]
        );
    }

    #[test]
    fn toggle_flips_only_the_named_column() {
        let mut columns = ColumnVisibility::default();
        columns.toggle(Column::Code);
        assert!(columns.is_visible(Column::Code));
        columns.toggle(Column::Total);
        assert!(!columns.is_visible(Column::Total));
        assert!(columns.is_visible(Column::Description));
        columns.toggle(Column::Code);
        assert!(!columns.is_visible(Column::Code));
    }

    #[test]
    fn set_is_idempotent() {
        let mut columns = ColumnVisibility::default();
        columns.set(Column::Discount, true);
        columns.set(Column::Discount, true);
        assert!(columns.is_visible(Column::Discount));
        columns.set(Column::Total, false);
        assert!(!columns.is_visible(Column::Total));
        assert!(columns.is_visible(Column::Description));
    }

    #[test]
    fn tax_config_checks_the_pair() {
        assert_eq!(TaxConfig::checked(0.0, TaxCategory::Exempt).unwrap().rate(), 0.0);
        assert_eq!(
            TaxConfig::checked(0.105, TaxCategory::Reduced).unwrap().category,
            TaxCategory::Reduced
        );
        assert_eq!(
            TaxConfig::checked(0.21, TaxCategory::Reduced),
            Err(ConfigError::TaxMismatch { rate: 0.21, category: TaxCategory::Reduced })
        );
        assert!(TaxConfig::checked(0.15, TaxCategory::General).is_err());
    }

    #[test]
    fn billable_requires_description_quantity_and_price() {
        let mut item = InvoiceItem::blank(ItemId(1));
        assert!(!item.is_billable());
        item.description = "Consulting".into();
        assert!(!item.is_billable());
        item.price = 10.0;
        assert!(item.is_billable());
        item.quantity = 0.0;
        assert!(!item.is_billable());
    }
}
