//! Projection of the session state onto a fixed-size invoice page.
//!
//! The [`Document`] is what both the terminal preview and the typst capture
//! draw from. It holds display strings only, no arithmetic.

use serde::Serialize;

use crate::calc::{self, Totals};
use crate::logo::Logo;
use crate::model::{Column, Template};
use crate::store::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageSpec {
    pub width_mm: f32,
    pub height_mm: f32,
    /// Size of the on-screen preview frame (96 dpi).
    pub preview_px: (u32, u32),
}

pub const A4: PageSpec = PageSpec {
    width_mm: 210.0,
    height_mm: 297.0,
    preview_px: (794, 1123),
};

impl PageSpec {
    /// Pixel size of a capture at the given resolution.
    pub fn pixels_at(&self, ppi: f32) -> (u32, u32) {
        let px = |mm: f32| (mm / 25.4 * ppi).round() as u32;
        (px(self.width_mm), px(self.height_mm))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Theme {
    pub accent: &'static str,
    pub header_fill: &'static str,
    pub header_text: &'static str,
    pub panel_fill: &'static str,
}

impl Template {
    pub fn theme(self) -> Theme {
        match self {
            Template::Classic => Theme {
                accent: "#333333",
                header_fill: "#333333",
                header_text: "#ffffff",
                panel_fill: "#f8f9fa",
            },
            Template::Modern => Theme {
                accent: "#2563eb",
                header_fill: "#2563eb",
                header_text: "#ffffff",
                panel_fill: "#eff6ff",
            },
            Template::Minimal => Theme {
                accent: "#111111",
                header_fill: "#ffffff",
                header_text: "#111111",
                panel_fill: "#ffffff",
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Header {
    pub logo: Option<Logo>,
    /// Only shown when there is no logo.
    pub title: Option<String>,
    pub company_name: String,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipientBlock {
    pub heading: String,
    pub name: String,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentLine {
    pub method: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableColumn {
    pub column: Column,
    pub label: String,
    pub align: Align,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemsTable {
    pub columns: Vec<TableColumn>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalLine {
    pub label: String,
    pub amount: String,
    pub emphasis: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub page: PageSpec,
    pub template: Template,
    pub theme: Theme,
    pub header: Header,
    pub recipient: RecipientBlock,
    pub payments: Option<Vec<PaymentLine>>,
    pub table: ItemsTable,
    pub totals: Vec<TotalLine>,
}

fn or_placeholder(value: &str, placeholder: &str) -> String {
    let value = value.trim();
    if value.is_empty() { placeholder.to_string() } else { value.to_string() }
}

fn optional_line(prefix: &str, value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| format!("{prefix}{value}"))
}

fn quantity(value: f64) -> String {
    if value.fract() == 0.0 { format!("{value:.0}") } else { format!("{value}") }
}

/// Columns that actually make it onto the page, in canonical order.
pub fn visible_columns(state: &AppState) -> Vec<Column> {
    let config = &state.config;
    Column::ALL
        .into_iter()
        .filter(|c| config.columns().is_visible(*c))
        .filter(|c| *c != Column::Discount || config.discount().enabled)
        .collect()
}

pub fn project(state: &AppState, totals: &Totals) -> Document {
    let issuer = state.invoice.issuer();
    let recipient = state.invoice.recipient();
    let config = &state.config;

    let header = Header {
        logo: issuer.logo.clone(),
        title: issuer.logo.is_none().then(|| "INVOICE".to_string()),
        company_name: or_placeholder(&issuer.company_name, "Your Company"),
        lines: [
            Some(or_placeholder(&issuer.company_address, "Company address")),
            Some(format!("Tax ID: {}", or_placeholder(&issuer.company_tax_id, "XX-XXXXXXXX-X"))),
            optional_line("Tel: ", &issuer.company_phone),
        ]
        .into_iter()
        .flatten()
        .collect(),
    };

    let recipient_block = RecipientBlock {
        heading: "Bill to:".into(),
        name: or_placeholder(&recipient.client_name, "Client name"),
        lines: [
            Some(or_placeholder(&recipient.client_address, "Client address")),
            Some(format!("Tax ID: {}", or_placeholder(&recipient.client_tax_id, "XX-XXXXXXXX-X"))),
            optional_line("Email: ", &recipient.client_email),
        ]
        .into_iter()
        .flatten()
        .collect(),
    };

    let payments = config.payments().enabled.then(|| {
        config
            .payments()
            .methods
            .iter()
            .map(|pm| {
                let method = or_placeholder(&pm.method, "Method");
                PaymentLine {
                    method: if pm.percentage > 0.0 {
                        format!("{method} ({})", calc::percent(pm.percentage))
                    } else {
                        method
                    },
                    amount: calc::money(pm.amount),
                }
            })
            .collect()
    });

    let columns = visible_columns(state);
    let rows = state
        .invoice
        .items()
        .iter()
        .map(|item| {
            let subtotal = totals.line(item.id).map_or(0.0, |l| l.subtotal);
            columns
                .iter()
                .map(|column| match column {
                    Column::Code => or_placeholder(&item.code, "-"),
                    Column::Description => or_placeholder(&item.description, "Product/Service"),
                    Column::Quantity => quantity(item.quantity),
                    Column::UnitPrice => calc::money(item.price),
                    Column::Discount if item.discount_percent > 0.0 => calc::percent(item.discount_percent),
                    Column::Discount => "-".to_string(),
                    Column::Total => calc::money(subtotal),
                })
                .collect()
        })
        .collect();

    let table = ItemsTable {
        columns: columns
            .iter()
            .map(|c| TableColumn {
                column: *c,
                label: c.label().to_string(),
                align: match c {
                    Column::Code | Column::Description => Align::Left,
                    Column::Quantity => Align::Center,
                    _ => Align::Right,
                },
            })
            .collect(),
        rows,
    };

    let mut total_lines = vec![TotalLine {
        label: "Subtotal:".into(),
        amount: calc::money(totals.subtotal),
        emphasis: false,
    }];
    if config.discount().enabled && config.discount().global_percent > 0.0 {
        total_lines.push(TotalLine {
            label: format!("Global discount ({}):", calc::percent(config.discount().global_percent)),
            amount: format!("-{}", calc::money(totals.global_discount_amount)),
            emphasis: false,
        });
    }
    total_lines.push(TotalLine {
        label: format!("Tax ({}%):", config.tax().category.display_rate()),
        amount: calc::money(totals.tax),
        emphasis: false,
    });
    total_lines.push(TotalLine {
        label: "Total:".into(),
        amount: calc::money(totals.total),
        emphasis: true,
    });

    Document {
        page: A4,
        template: config.template(),
        theme: config.template().theme(),
        header,
        recipient: recipient_block,
        payments,
        table,
        totals: total_lines,
    }
}
