//! Interactive prompts for building an invoice in the terminal.

use std::path::PathBuf;

use anyhow::Result;
use inquire::{Confirm, CustomType, MultiSelect, Select, Text};

use crate::logo::Logo;
use crate::model::{Column, InvoiceItem, ItemId, TaxCategory, Template};
use crate::store::{AppState, ConfigStore, InvoiceStore, StoreError, IssuerEdit, ItemEdit, PaymentEdit, RecipientEdit};

const DONE_OPT: &str = "✔ Done";

fn text(prompt: &str, default: &str) -> Result<String> {
    Ok(Text::new(prompt).with_default(default).prompt()?.trim().to_string())
}

fn number(prompt: &str, default: f64) -> Result<f64> {
    Ok(CustomType::<f64>::new(prompt)
        .with_default(default)
        .with_error_message("Please type a valid number")
        .prompt()?)
}

/// Prompts the company fields, prefilled with whatever the issuer holds now.
pub fn fill_issuer(state: &mut AppState) -> Result<()> {
    println!("\n--- 🏢 Your Company ---");
    let current = state.invoice.issuer().clone();
    let inv = &mut state.invoice;
    inv.update_issuer(IssuerEdit::CompanyName(text("Company name:", &current.company_name)?));
    inv.update_issuer(IssuerEdit::CompanyAddress(text("Full address:", &current.company_address)?));
    inv.update_issuer(IssuerEdit::CompanyTaxId(text("Tax ID (XX-XXXXXXXX-X):", &current.company_tax_id)?));
    inv.update_issuer(IssuerEdit::CompanyPhone(text("Phone (optional):", &current.company_phone)?));
    Ok(())
}

/// Asks for a logo file until one is accepted or the user gives up.
pub fn pick_logo(state: &mut AppState) -> Result<()> {
    let has_logo = state.invoice.issuer().logo.is_some();
    let prompt = if has_logo { "Change the company logo?" } else { "Add a company logo?" };
    if !Confirm::new(prompt).with_default(false).prompt()? {
        return Ok(());
    }

    loop {
        println!("📂 Opening file picker...");
        let picked = rfd::FileDialog::new()
            .set_title("Select Logo (PNG, JPG up to 2MB)")
            .add_filter("Images", &["png", "jpg", "jpeg", "gif", "webp", "bmp"])
            .pick_file();
        let path = match picked {
            Some(p) => p,
            None => {
                let input = Text::new("Logo path (leave empty to skip):").prompt()?;
                if input.trim().is_empty() {
                    return Ok(());
                }
                PathBuf::from(crate::settings::expand_home_dir(input.trim()))
            }
        };

        match Logo::from_path(&path) {
            Ok(logo) => {
                println!("✅ Logo loaded ({}).", logo.mime().unwrap_or("image"));
                state.invoice.set_logo(Some(logo));
                return Ok(());
            }
            Err(e) => {
                println!("❌ {e}");
                if !Confirm::new("Try another file?").with_default(true).prompt()? {
                    return Ok(());
                }
            }
        }
    }
}

pub fn fill_recipient(state: &mut AppState) -> Result<()> {
    println!("\n--- 👤 Bill To ---");
    let current = state.invoice.recipient().clone();
    let inv = &mut state.invoice;
    inv.update_recipient(RecipientEdit::ClientName(text("Client name:", &current.client_name)?));
    inv.update_recipient(RecipientEdit::ClientAddress(text("Client address:", &current.client_address)?));
    inv.update_recipient(RecipientEdit::ClientTaxId(text("Client tax ID:", &current.client_tax_id)?));
    inv.update_recipient(RecipientEdit::ClientEmail(text("Client email (optional):", &current.client_email)?));
    Ok(())
}

pub fn configure(state: &mut AppState) -> Result<()> {
    println!("\n--- ⚙️  Invoice Settings ---");
    let config = &mut state.config;

    let current = TaxCategory::ALL.iter().position(|c| *c == config.tax().category).unwrap_or(2);
    let category = Select::new("Tax category:", TaxCategory::ALL.to_vec())
        .with_starting_cursor(current)
        .prompt()?;
    config.set_tax(category.rate(), category)?;

    let wants_discount = Confirm::new("Enable discounts?")
        .with_default(config.discount().enabled)
        .prompt()?;
    if wants_discount != config.discount().enabled {
        config.toggle_discount();
    }
    if config.discount().enabled {
        loop {
            let value = number("Global discount (%):", config.discount().global_percent)?;
            match config.set_global_discount(value) {
                Ok(()) => break,
                Err(e) => println!("❌ {e}"),
            }
        }
    }

    let wants_payments = Confirm::new("Show payment methods?")
        .with_default(config.payments().enabled)
        .prompt()?;
    if wants_payments != config.payments().enabled {
        config.toggle_payment_methods();
    }
    if config.payments().enabled {
        edit_payment_methods(state)?;
    }

    let config = &mut state.config;
    let optional = [Column::Code, Column::Discount];
    let selected: Vec<usize> = optional
        .iter()
        .enumerate()
        .filter(|(_, c)| config.columns().is_visible(**c))
        .map(|(i, _)| i)
        .collect();
    let chosen = MultiSelect::new("Optional columns:", optional.to_vec())
        .with_default(&selected)
        .prompt()?;
    for column in optional {
        config.set_column(column, chosen.contains(&column));
    }
    if chosen.contains(&Column::Discount) && !config.discount().enabled {
        println!("ℹ️  The discount column only shows when discounts are enabled.");
    }

    let current = Template::ALL.iter().position(|t| *t == config.template()).unwrap_or(0);
    let template = Select::new("Template:", Template::ALL.to_vec())
        .with_starting_cursor(current)
        .prompt()?;
    config.set_template(template);
    Ok(())
}

/// Prompts name, amount and share of one payment method.
fn edit_payment_method(config: &mut ConfigStore, index: usize, label: &str) -> Result<()> {
    let Some(pm) = config.payments().methods.get(index).cloned() else {
        return Ok(());
    };
    config.update_payment_method(index, PaymentEdit::Method(text(label, &pm.method)?))?;
    let fields: [(&str, f64, fn(f64) -> PaymentEdit); 2] = [
        ("Amount ($):", pm.amount, PaymentEdit::Amount),
        ("Share of total (%, 0 to hide):", pm.percentage, PaymentEdit::Percentage),
    ];
    for (prompt, default, edit) in fields {
        loop {
            let value = number(prompt, default)?;
            match config.update_payment_method(index, edit(value)) {
                Ok(()) => break,
                Err(e) => println!("❌ {e}"),
            }
        }
    }
    Ok(())
}

fn edit_payment_methods(state: &mut AppState) -> Result<()> {
    let config = &mut state.config;
    for index in 0..config.payments().methods.len() {
        edit_payment_method(config, index, &format!("Method {}:", index + 1))?;
    }
    while config.payments().methods.len() > 1
        && Confirm::new("Remove a payment method?").with_default(false).prompt()?
    {
        let options: Vec<String> = config
            .payments()
            .methods
            .iter()
            .map(|pm| format!("{} (${:.2})", pm.method, pm.amount))
            .collect();
        let choice = Select::new("Remove which method?", options).raw_prompt()?;
        let removed = config.remove_payment_method(choice.index)?;
        println!("🗑️  Removed {}", removed.method);
    }
    while Confirm::new("Add another payment method?").with_default(false).prompt()? {
        let index = config.add_payment_method();
        edit_payment_method(config, index, "Method (Cash, Transfer, Card...):")?;
    }
    Ok(())
}

fn item_number(
    inv: &mut InvoiceStore,
    id: ItemId,
    prompt: &str,
    default: f64,
    edit: fn(f64) -> ItemEdit,
) -> Result<()> {
    loop {
        let value = number(prompt, default)?;
        match inv.update_item(id, edit(value)) {
            Ok(()) => return Ok(()),
            Err(e) => println!("❌ {e}"),
        }
    }
}

/// Stores the description and reports whether the remaining fields are wanted.
fn set_description(inv: &mut InvoiceStore, id: ItemId, description: String) -> Result<bool, StoreError> {
    let wanted = !description.is_empty();
    inv.update_item(id, ItemEdit::Description(description))?;
    Ok(wanted)
}

/// Prompts every field of one item, re-asking on out-of-range numbers.
/// An empty description ends the prompts early.
pub fn edit_item(state: &mut AppState, id: ItemId) -> Result<()> {
    let Some(current) = state.invoice.item(id).cloned() else {
        return Ok(());
    };
    let show_code = state.config.columns().is_visible(Column::Code);
    let discounts = state.config.discount().enabled;
    let inv = &mut state.invoice;

    let description = text("Description:", &current.description)?;
    if !set_description(inv, id, description)? {
        return Ok(());
    }
    if show_code {
        inv.update_item(id, ItemEdit::Code(text("Code/SKU:", &current.code)?))?;
    }

    item_number(inv, id, "Quantity:", current.quantity, ItemEdit::Quantity)?;
    item_number(inv, id, "Unit price ($):", current.price, ItemEdit::Price)?;
    if discounts {
        item_number(inv, id, "Item discount (%):", current.discount_percent, ItemEdit::DiscountPercent)?;
    }
    Ok(())
}

/// Fills the blank starting item, then keeps adding until an empty description.
pub fn enter_items(state: &mut AppState) -> Result<()> {
    println!("\n--- 📦 Products & Services ---");
    println!("(Leave Description empty to finish)");

    if let Some(first) = state.invoice.items().first().map(|i| i.id) {
        edit_item(state, first)?;
    }
    loop {
        if !Confirm::new("Add another item?").with_default(true).prompt()? {
            break;
        }
        let id = state.invoice.add_item()?;
        edit_item(state, id)?;
        if state.invoice.item(id).is_some_and(|i| i.description.is_empty()) {
            state.invoice.remove_item(id)?;
            break;
        }
    }
    Ok(())
}

fn item_label(item: &InvoiceItem) -> String {
    let desc = if item.description.is_empty() { "(no description)" } else { &item.description };
    format!("{} {} - {}x ${:.2}", item.id, desc, item.quantity, item.price)
}

pub fn remove_item(state: &mut AppState) -> Result<()> {
    let mut options: Vec<String> = state.invoice.items().iter().map(item_label).collect();
    if options.is_empty() {
        println!("ℹ️  There are no items to remove.");
        return Ok(());
    }
    options.push(DONE_OPT.to_string());
    let ids: Vec<ItemId> = state.invoice.items().iter().map(|i| i.id).collect();
    let choice = Select::new("Remove which item?", options).raw_prompt()?;
    if let Some(id) = ids.get(choice.index) {
        let removed = state.invoice.remove_item(*id)?;
        println!("🗑️  Removed {}", item_label(&removed));
    }
    Ok(())
}

pub fn pick_item(state: &AppState) -> Result<Option<ItemId>> {
    let mut options: Vec<String> = state.invoice.items().iter().map(item_label).collect();
    options.push(DONE_OPT.to_string());
    let ids: Vec<ItemId> = state.invoice.items().iter().map(|i| i.id).collect();
    let choice = Select::new("Edit which item?", options).raw_prompt()?;
    Ok(ids.get(choice.index).copied())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Export,
    AddItem,
    EditItem,
    RemoveItem,
    EditParties,
    EditSettings,
    Reset,
    Quit,
}

impl std::fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ReviewAction::Export => "📄 Export PDF",
            ReviewAction::AddItem => "➕ Add item",
            ReviewAction::EditItem => "✏️  Edit item",
            ReviewAction::RemoveItem => "🗑️  Remove item",
            ReviewAction::EditParties => "🏢 Edit company / client",
            ReviewAction::EditSettings => "⚙️  Edit tax, discounts and columns",
            ReviewAction::Reset => "♻️  Start over",
            ReviewAction::Quit => "🚪 Quit",
        })
    }
}

pub fn review_action() -> Result<ReviewAction> {
    use ReviewAction::*;
    let options = vec![Export, AddItem, EditItem, RemoveItem, EditParties, EditSettings, Reset, Quit];
    Ok(Select::new("What next?", options).prompt()?)
}
