//! In-memory session state: the invoice data and its configuration.
//!
//! Both stores are plain values owned by an [`AppState`] that the caller passes
//! around. All mutation goes through typed edit variants so that field access
//! stays checked at compile time.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::logo::Logo;
use crate::model::{
    Column, ColumnVisibility, DiscountConfig, InvoiceItem, Issuer, ItemId, PaymentConfig,
    PaymentMethod, Recipient, TaxCategory, TaxConfig, Template,
};

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("Item {0} does not exist")]
    UnknownItem(ItemId),
    #[error("Item {0} appears more than once")]
    DuplicateItem(ItemId),
    #[error("{field} must be a number greater than or equal to 0 (got {value})")]
    Negative { field: &'static str, value: f64 },
    #[error("Discount must be between 0 and 100% (got {0})")]
    DiscountOutOfRange(f64),
    #[error("No more item ids are available in this session")]
    IdSpaceExhausted,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Global discount must be between 0 and 100% (got {0})")]
    DiscountOutOfRange(f64),
    #[error("Tax rate {rate} does not match the {category} category")]
    TaxMismatch { rate: f64, category: TaxCategory },
    #[error("Payment amount must be greater than or equal to 0 (got {0})")]
    NegativeAmount(f64),
    #[error("Payment share must be between 0 and 100% (got {0})")]
    PercentageOutOfRange(f64),
    #[error("Payment methods are enabled but none are listed")]
    NoPaymentMethods,
    #[error("At least one payment method is required")]
    LastPaymentMethod,
    #[error("Payment method {0} does not exist")]
    UnknownPaymentMethod(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum IssuerEdit {
    CompanyName(String),
    CompanyAddress(String),
    CompanyTaxId(String),
    CompanyPhone(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecipientEdit {
    ClientName(String),
    ClientAddress(String),
    ClientTaxId(String),
    ClientEmail(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemEdit {
    Code(String),
    Description(String),
    Quantity(f64),
    Price(f64),
    DiscountPercent(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaymentEdit {
    Method(String),
    Amount(f64),
    Percentage(f64),
}

fn non_negative(field: &'static str, value: f64) -> Result<f64, StoreError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(StoreError::Negative { field, value })
    }
}

fn in_percent_range(value: f64) -> bool {
    value.is_finite() && (0.0..=100.0).contains(&value)
}

fn percent(value: f64) -> Result<f64, StoreError> {
    if in_percent_range(value) {
        Ok(value)
    } else {
        Err(StoreError::DiscountOutOfRange(value))
    }
}

/// Rejects values that the calculation engine must never see.
fn check_item(item: &InvoiceItem) -> Result<(), StoreError> {
    non_negative("Quantity", item.quantity)?;
    non_negative("Price", item.price)?;
    percent(item.discount_percent)?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceStore {
    issuer: Issuer,
    recipient: Recipient,
    items: Vec<InvoiceItem>,
    next_id: u64,
}

impl Default for InvoiceStore {
    fn default() -> Self {
        Self {
            issuer: Issuer::default(),
            recipient: Recipient::default(),
            items: vec![InvoiceItem::blank(ItemId(1))],
            next_id: 2,
        }
    }
}

impl InvoiceStore {
    pub fn issuer(&self) -> &Issuer {
        &self.issuer
    }

    pub fn recipient(&self) -> &Recipient {
        &self.recipient
    }

    pub fn items(&self) -> &[InvoiceItem] {
        &self.items
    }

    pub fn item(&self, id: ItemId) -> Option<&InvoiceItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Replaces the whole issuer, e.g. with saved defaults.
    pub fn set_issuer(&mut self, issuer: Issuer) {
        self.issuer = issuer;
    }

    pub fn update_issuer(&mut self, edit: IssuerEdit) {
        let issuer = &mut self.issuer;
        match edit {
            IssuerEdit::CompanyName(v) => issuer.company_name = v,
            IssuerEdit::CompanyAddress(v) => issuer.company_address = v,
            IssuerEdit::CompanyTaxId(v) => issuer.company_tax_id = v,
            IssuerEdit::CompanyPhone(v) => issuer.company_phone = v,
        }
    }

    pub fn set_logo(&mut self, logo: Option<Logo>) {
        self.issuer.logo = logo;
    }

    pub fn update_recipient(&mut self, edit: RecipientEdit) {
        let recipient = &mut self.recipient;
        match edit {
            RecipientEdit::ClientName(v) => recipient.client_name = v,
            RecipientEdit::ClientAddress(v) => recipient.client_address = v,
            RecipientEdit::ClientTaxId(v) => recipient.client_tax_id = v,
            RecipientEdit::ClientEmail(v) => recipient.client_email = v,
        }
    }

    pub fn add_item(&mut self) -> Result<ItemId, StoreError> {
        let next = self.next_id.checked_add(1).ok_or(StoreError::IdSpaceExhausted)?;
        let id = ItemId(self.next_id);
        self.next_id = next;
        self.items.push(InvoiceItem::blank(id));
        debug!(%id, "item added");
        Ok(id)
    }

    /// Applies one field edit. Out-of-range numbers leave the item untouched.
    pub fn update_item(&mut self, id: ItemId, edit: ItemEdit) -> Result<(), StoreError> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(StoreError::UnknownItem(id))?;
        match edit {
            ItemEdit::Code(v) => item.code = v,
            ItemEdit::Description(v) => item.description = v,
            ItemEdit::Quantity(v) => item.quantity = non_negative("Quantity", v)?,
            ItemEdit::Price(v) => item.price = non_negative("Price", v)?,
            ItemEdit::DiscountPercent(v) => item.discount_percent = percent(v)?,
        }
        Ok(())
    }

    pub fn remove_item(&mut self, id: ItemId) -> Result<InvoiceItem, StoreError> {
        let pos = self
            .items
            .iter()
            .position(|i| i.id == id)
            .ok_or(StoreError::UnknownItem(id))?;
        debug!(%id, "item removed");
        Ok(self.items.remove(pos))
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ConfigStore {
    #[serde(default)]
    template: Template,
    #[serde(default)]
    tax: TaxConfig,
    #[serde(default)]
    discount: DiscountConfig,
    #[serde(default)]
    payments: PaymentConfig,
    #[serde(default)]
    columns: ColumnVisibility,
}

impl ConfigStore {
    pub fn template(&self) -> Template {
        self.template
    }

    pub fn tax(&self) -> &TaxConfig {
        &self.tax
    }

    pub fn discount(&self) -> &DiscountConfig {
        &self.discount
    }

    pub fn payments(&self) -> &PaymentConfig {
        &self.payments
    }

    pub fn columns(&self) -> &ColumnVisibility {
        &self.columns
    }

    pub fn set_tax_category(&mut self, category: TaxCategory) {
        self.tax.category = category;
    }

    /// Accepts an explicit (rate, category) pair only when both agree.
    pub fn set_tax(&mut self, rate: f64, category: TaxCategory) -> Result<(), ConfigError> {
        self.tax = TaxConfig::checked(rate, category)?;
        Ok(())
    }

    pub fn toggle_discount(&mut self) {
        self.discount.enabled = !self.discount.enabled;
    }

    pub fn set_global_discount(&mut self, value: f64) -> Result<(), ConfigError> {
        if !in_percent_range(value) {
            return Err(ConfigError::DiscountOutOfRange(value));
        }
        self.discount.global_percent = value;
        Ok(())
    }

    pub fn toggle_payment_methods(&mut self) {
        self.payments.enabled = !self.payments.enabled;
    }

    pub fn add_payment_method(&mut self) -> usize {
        self.payments.methods.push(PaymentMethod {
            method: String::new(),
            amount: 0.0,
            percentage: 0.0,
        });
        self.payments.methods.len() - 1
    }

    pub fn update_payment_method(&mut self, index: usize, edit: PaymentEdit) -> Result<(), ConfigError> {
        let pm = self
            .payments
            .methods
            .get_mut(index)
            .ok_or(ConfigError::UnknownPaymentMethod(index))?;
        match edit {
            PaymentEdit::Method(v) => pm.method = v,
            PaymentEdit::Amount(v) => {
                if !v.is_finite() || v < 0.0 {
                    return Err(ConfigError::NegativeAmount(v));
                }
                pm.amount = v;
            }
            PaymentEdit::Percentage(v) => {
                if !in_percent_range(v) {
                    return Err(ConfigError::PercentageOutOfRange(v));
                }
                pm.percentage = v;
            }
        }
        Ok(())
    }

    pub fn remove_payment_method(&mut self, index: usize) -> Result<PaymentMethod, ConfigError> {
        if index >= self.payments.methods.len() {
            return Err(ConfigError::UnknownPaymentMethod(index));
        }
        if self.payments.methods.len() == 1 {
            return Err(ConfigError::LastPaymentMethod);
        }
        Ok(self.payments.methods.remove(index))
    }

    pub fn toggle_column(&mut self, column: Column) {
        self.columns.toggle(column);
    }

    pub fn set_column(&mut self, column: Column, visible: bool) {
        self.columns.set(column, visible);
    }

    pub fn set_template(&mut self, template: Template) {
        self.template = template;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Applies the same checks as the setters to a config read from disk.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !in_percent_range(self.discount.global_percent) {
            return Err(ConfigError::DiscountOutOfRange(self.discount.global_percent));
        }
        if self.payments.enabled && self.payments.methods.is_empty() {
            return Err(ConfigError::NoPaymentMethods);
        }
        for pm in &self.payments.methods {
            if !pm.amount.is_finite() || pm.amount < 0.0 {
                return Err(ConfigError::NegativeAmount(pm.amount));
            }
            if !in_percent_range(pm.percentage) {
                return Err(ConfigError::PercentageOutOfRange(pm.percentage));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error(transparent)]
    Invoice(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Serializable snapshot of everything the export needs.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Session {
    pub issuer: Issuer,
    pub recipient: Recipient,
    #[serde(default)]
    pub items: Vec<InvoiceItem>,
    #[serde(default)]
    pub config: ConfigStore,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    pub invoice: InvoiceStore,
    pub config: ConfigStore,
}

impl AppState {
    pub fn from_session(session: Session) -> Result<Self, SessionError> {
        let mut seen = HashSet::new();
        for item in &session.items {
            if !seen.insert(item.id) {
                return Err(StoreError::DuplicateItem(item.id).into());
            }
            check_item(item)?;
        }
        session.config.validate()?;
        let next_id = session
            .items
            .iter()
            .map(|i| i.id.0)
            .max()
            .unwrap_or(0)
            .checked_add(1)
            .ok_or(StoreError::IdSpaceExhausted)?;
        Ok(Self {
            invoice: InvoiceStore {
                issuer: session.issuer,
                recipient: session.recipient,
                items: session.items,
                next_id,
            },
            config: session.config,
        })
    }

    pub fn to_session(&self) -> Session {
        Session {
            issuer: self.invoice.issuer.clone(),
            recipient: self.invoice.recipient.clone(),
            items: self.invoice.items.clone(),
            config: self.config.clone(),
        }
    }

    pub fn reset(&mut self) {
        self.invoice.reset();
        self.config.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_one_blank_item() {
        let store = InvoiceStore::default();
        assert_eq!(store.items().len(), 1);
        assert_eq!(store.items()[0].id, ItemId(1));
        assert_eq!(store.items()[0].quantity, 1.0);
    }

    #[test]
    fn ids_are_never_reused() {
        let mut store = InvoiceStore::default();
        let a = store.add_item().unwrap();
        store.remove_item(a).unwrap();
        let b = store.add_item().unwrap();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn removing_the_last_item_is_allowed() {
        let mut store = InvoiceStore::default();
        store.remove_item(ItemId(1)).unwrap();
        assert!(store.items().is_empty());
        assert_eq!(store.remove_item(ItemId(1)), Err(StoreError::UnknownItem(ItemId(1))));
    }

    #[test]
    fn item_edits_reject_out_of_range_numbers() {
        let mut store = InvoiceStore::default();
        let id = ItemId(1);
        store.update_item(id, ItemEdit::Price(250.0)).unwrap();

        assert!(matches!(
            store.update_item(id, ItemEdit::Price(-1.0)),
            Err(StoreError::Negative { field: "Price", .. })
        ));
        assert!(matches!(
            store.update_item(id, ItemEdit::Quantity(f64::NAN)),
            Err(StoreError::Negative { field: "Quantity", .. })
        ));
        assert_eq!(
            store.update_item(id, ItemEdit::DiscountPercent(120.0)),
            Err(StoreError::DiscountOutOfRange(120.0))
        );
        assert_eq!(store.item(id).unwrap().price, 250.0);
        assert_eq!(store.item(id).unwrap().discount_percent, 0.0);
    }

    #[test]
    fn typed_edits_touch_only_their_field() {
        let mut store = InvoiceStore::default();
        store.update_issuer(IssuerEdit::CompanyName("Acme".into()));
        store.update_recipient(RecipientEdit::ClientEmail("a@b.c".into()));
        store.update_item(ItemId(1), ItemEdit::Description("Widget".into())).unwrap();

        assert_eq!(store.issuer().company_name, "Acme");
        assert!(store.issuer().company_address.is_empty());
        assert_eq!(store.recipient().client_email, "a@b.c");
        assert!(store.recipient().client_name.is_empty());
        assert_eq!(store.items()[0].description, "Widget");
    }

    #[test]
    fn last_payment_method_cannot_be_removed() {
        let mut config = ConfigStore::default();
        assert_eq!(config.remove_payment_method(0), Err(ConfigError::LastPaymentMethod));
        let idx = config.add_payment_method();
        config.update_payment_method(idx, PaymentEdit::Method("Transfer".into())).unwrap();
        assert_eq!(config.remove_payment_method(5), Err(ConfigError::UnknownPaymentMethod(5)));
        let removed = config.remove_payment_method(0).unwrap();
        assert_eq!(removed.method, "Cash");
        assert_eq!(config.payments.methods.len(), 1);
        assert_eq!(config.payments.methods[0].method, "Transfer");
    }

    #[test]
    fn payment_amount_must_not_be_negative() {
        let mut config = ConfigStore::default();
        assert_eq!(
            config.update_payment_method(0, PaymentEdit::Amount(-5.0)),
            Err(ConfigError::NegativeAmount(-5.0))
        );
        config.update_payment_method(0, PaymentEdit::Amount(50.0)).unwrap();
        assert_eq!(config.payments.methods[0].amount, 50.0);
    }

    #[test]
    fn tax_pair_must_agree() {
        let mut config = ConfigStore::default();
        config.set_tax(0.105, TaxCategory::Reduced).unwrap();
        assert_eq!(config.tax.category, TaxCategory::Reduced);
        assert_eq!(
            config.set_tax(0.21, TaxCategory::Exempt),
            Err(ConfigError::TaxMismatch { rate: 0.21, category: TaxCategory::Exempt })
        );
        assert_eq!(config.tax.category, TaxCategory::Reduced);
    }

    #[test]
    fn global_discount_is_bounded() {
        let mut config = ConfigStore::default();
        config.set_global_discount(15.0).unwrap();
        assert_eq!(config.set_global_discount(100.5), Err(ConfigError::DiscountOutOfRange(100.5)));
        assert_eq!(config.discount.global_percent, 15.0);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut state = AppState::default();
        state.invoice.update_issuer(IssuerEdit::CompanyName("Acme".into()));
        state.invoice.add_item().unwrap();
        state.config.toggle_discount();
        state.config.toggle_column(Column::Code);
        state.reset();
        assert_eq!(state, AppState::default());
    }

    #[test]
    fn session_load_validates_items() {
        let mut session = AppState::default().to_session();
        session.items[0].price = -3.0;
        assert!(matches!(
            AppState::from_session(session.clone()),
            Err(SessionError::Invoice(StoreError::Negative { field: "Price", .. }))
        ));

        session.items[0].price = 3.0;
        session.items.push(session.items[0].clone());
        assert_eq!(
            AppState::from_session(session),
            Err(SessionError::Invoice(StoreError::DuplicateItem(ItemId(1))))
        );
    }

    #[test]
    fn session_load_continues_id_sequence() {
        let mut session = AppState::default().to_session();
        session.items[0].id = ItemId(41);
        let mut state = AppState::from_session(session).unwrap();
        assert_eq!(state.invoice.add_item(), Ok(ItemId(42)));
    }

    #[test]
    fn session_with_the_largest_id_cannot_continue_the_sequence() {
        let mut session = AppState::default().to_session();
        session.items[0].id = ItemId(u64::MAX);
        assert_eq!(
            AppState::from_session(session),
            Err(SessionError::Invoice(StoreError::IdSpaceExhausted))
        );

        let mut session = AppState::default().to_session();
        session.items[0].id = ItemId(u64::MAX - 1);
        let mut state = AppState::from_session(session).unwrap();
        assert_eq!(state.invoice.add_item(), Err(StoreError::IdSpaceExhausted));
        assert_eq!(state.invoice.items().len(), 1);
    }

    #[test]
    fn session_load_validates_payment_methods() {
        let json = r#"{
            "issuer": {"company_name": "Acme"},
            "recipient": {"client_name": "Globex"},
            "items": [],
            "config": {"payments": {"enabled": true, "methods": [{"method": "Cash", "amount": -5.0}]}}
        }"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(
            AppState::from_session(session),
            Err(SessionError::Config(ConfigError::NegativeAmount(-5.0)))
        );

        let mut session = AppState::default().to_session();
        session.config.payments.enabled = true;
        session.config.payments.methods.clear();
        assert_eq!(
            AppState::from_session(session.clone()),
            Err(SessionError::Config(ConfigError::NoPaymentMethods))
        );

        session.config.payments.enabled = false;
        assert!(AppState::from_session(session).is_ok());
    }

    #[test]
    fn session_load_validates_global_discount() {
        let mut session = AppState::default().to_session();
        session.config.discount.global_percent = 500.0;
        assert_eq!(
            AppState::from_session(session),
            Err(SessionError::Config(ConfigError::DiscountOutOfRange(500.0)))
        );
    }

    #[test]
    fn payment_share_is_a_percentage() {
        let mut config = ConfigStore::default();
        config.update_payment_method(0, PaymentEdit::Percentage(40.0)).unwrap();
        assert_eq!(config.payments().methods[0].percentage, 40.0);
        assert_eq!(
            config.update_payment_method(0, PaymentEdit::Percentage(140.0)),
            Err(ConfigError::PercentageOutOfRange(140.0))
        );
        assert_eq!(config.payments().methods[0].percentage, 40.0);
    }

    #[test]
    fn set_column_is_explicit() {
        let mut config = ConfigStore::default();
        config.set_column(Column::Code, true);
        config.set_column(Column::Code, true);
        assert!(config.columns().is_visible(Column::Code));
        config.set_column(Column::Code, false);
        assert!(!config.columns().is_visible(Column::Code));
    }
}
