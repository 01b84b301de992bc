use comfy_table::{Attribute, Cell, CellAlignment, Color, Table};

use crate::render::{Align, Document};

fn align(a: Align) -> CellAlignment {
    match a {
        Align::Left => CellAlignment::Left,
        Align::Center => CellAlignment::Center,
        Align::Right => CellAlignment::Right,
    }
}

/// Terminal rendering of the invoice page.
pub fn render_text(doc: &Document) -> String {
    let mut out = String::new();

    if doc.header.logo.is_some() {
        out.push_str("[logo]\n");
    }
    if let Some(title) = &doc.header.title {
        out.push_str(&format!("{title}\n"));
    }
    out.push_str(&format!("{}\n", doc.header.company_name));
    for line in &doc.header.lines {
        out.push_str(&format!("  {line}\n"));
    }

    out.push_str(&format!("\n{}\n  {}\n", doc.recipient.heading, doc.recipient.name));
    for line in &doc.recipient.lines {
        out.push_str(&format!("  {line}\n"));
    }

    if let Some(payments) = &doc.payments {
        out.push_str("\nPayment:\n");
        for pm in payments {
            out.push_str(&format!("  {:<24} {}\n", pm.method, pm.amount));
        }
    }

    if !doc.table.columns.is_empty() {
        let mut table = Table::new();
        table.set_header(
            doc.table
                .columns
                .iter()
                .map(|c| Cell::new(&c.label).add_attribute(Attribute::Bold)),
        );
        for row in &doc.table.rows {
            table.add_row(
                row.iter()
                    .zip(&doc.table.columns)
                    .map(|(text, col)| Cell::new(text).set_alignment(align(col.align))),
            );
        }
        out.push_str(&format!("\n{table}\n"));
    }

    let mut totals = Table::new();
    for line in &doc.totals {
        let amount = Cell::new(&line.amount).set_alignment(CellAlignment::Right);
        if line.emphasis {
            totals.add_row(vec![
                Cell::new(&line.label).add_attribute(Attribute::Bold),
                amount.add_attribute(Attribute::Bold).fg(Color::Rgb { r: 4, g: 120, b: 87 }),
            ]);
        } else {
            totals.add_row(vec![Cell::new(&line.label), amount]);
        }
    }
    out.push_str(&format!("\n{totals}\n"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::compute_totals;
    use crate::model::{Column, ItemId};
    use crate::render::project;
    use crate::store::{AppState, ItemEdit, RecipientEdit};

    #[test]
    fn preview_shows_visible_columns_and_totals() {
        let mut state = AppState::default();
        state.invoice.update_recipient(RecipientEdit::ClientName("Globex".into()));
        state.invoice.update_item(ItemId(1), ItemEdit::Description("Hosting".into())).unwrap();
        state.invoice.update_item(ItemId(1), ItemEdit::Price(100.0)).unwrap();
        state.config.toggle_column(Column::Code);
        let totals = compute_totals(state.invoice.items(), state.config.discount(), state.config.tax());

        let text = render_text(&project(&state, &totals));

        assert!(text.contains("INVOICE"));
        assert!(text.contains("Globex"));
        assert!(text.contains("Code"));
        assert!(text.contains("Hosting"));
        assert!(text.contains("$121.00"));
        assert!(!text.contains("Payment:"));
    }
}
