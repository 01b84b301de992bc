//! Invoice arithmetic.
//!
//! Everything is accumulated at full `f64` precision; rounding to cents only
//! happens when a figure is formatted for display.

use serde::Serialize;

use crate::model::{DiscountConfig, InvoiceItem, ItemId, TaxConfig};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LineTotals {
    pub id: ItemId,
    /// quantity × price
    pub line_total: f64,
    pub discount_amount: f64,
    pub subtotal: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Totals {
    pub lines: Vec<LineTotals>,
    pub pre_discount_subtotal: f64,
    pub global_discount_amount: f64,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
}

impl Totals {
    pub fn line(&self, id: ItemId) -> Option<&LineTotals> {
        self.lines.iter().find(|l| l.id == id)
    }
}

/// Derives per-line and aggregate totals. Pure: same inputs, same bits out.
///
/// Item discounts apply first, then the global discount on what remains, then
/// tax on the discounted subtotal. With discounts disabled both discount
/// layers are zero regardless of the stored percentages.
pub fn compute_totals(items: &[InvoiceItem], discount: &DiscountConfig, tax: &TaxConfig) -> Totals {
    let lines: Vec<LineTotals> = items
        .iter()
        .map(|item| {
            let line_total = item.quantity * item.price;
            let discount_amount = if discount.enabled {
                line_total * item.discount_percent / 100.0
            } else {
                0.0
            };
            LineTotals {
                id: item.id,
                line_total,
                discount_amount,
                subtotal: line_total - discount_amount,
            }
        })
        .collect();

    let pre_discount_subtotal: f64 = lines.iter().map(|l| l.subtotal).sum();
    let global_discount_amount = if discount.enabled {
        pre_discount_subtotal * discount.global_percent / 100.0
    } else {
        0.0
    };
    let subtotal = pre_discount_subtotal - global_discount_amount;
    let tax = subtotal * tax.rate();

    Totals {
        lines,
        pre_discount_subtotal,
        global_discount_amount,
        subtotal,
        tax,
        total: subtotal + tax,
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn money(value: f64) -> String {
    format!("${:.2}", round2(value))
}

/// `10` rather than `10.0`, `10.5` stays as is.
pub fn percent(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}%")
    } else {
        format!("{}%", value)
    }
}
