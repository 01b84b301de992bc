mod calc;
mod capture;
mod encode;
mod export;
mod logo;
mod model;
mod notify;
mod preview;
mod render;
mod settings;
mod store;
mod wizard;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use inquire::{Confirm, CustomType, Select, Text};
use tracing_subscriber::EnvFilter;

use crate::calc::compute_totals;
use crate::capture::TypstCapture;
use crate::encode::PdfEncoder;
use crate::export::{DirectoryDownload, ExportError, Exporter, PageFit};
use crate::model::{Column, ItemId, TaxCategory};
use crate::notify::ConsoleNotifier;
use crate::render::{project, Document};
use crate::settings::AppSettings;
use crate::store::{AppState, IssuerEdit, ItemEdit, RecipientEdit, Session};
use crate::wizard::ReviewAction;

#[derive(Parser)]
#[command(name = "invoice-builder", version, about = "Build a one-page invoice and export it as PDF")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an invoice interactively
    New,
    /// Export a saved session file (TOML or JSON) to PDF
    Render {
        input: PathBuf,
        /// Output directory (defaults to the configured one)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show the invoice for a session file without exporting
    Preview {
        input: PathBuf,
        /// Print the page model as JSON instead of tables
        #[arg(long)]
        json: bool,
    },
    /// Write a sample session file to start from
    Init { path: PathBuf },
    /// Configure output folder, resolution and company defaults
    Config,
    /// Open output folder
    Open,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    let settings = settings::load_settings()?.unwrap_or_default();

    match command {
        Commands::New => new_invoice(&settings),
        Commands::Render { input, out } => {
            let state = load_session(&input)?;
            let dir = out.unwrap_or_else(|| settings.output_path());
            let ok = export_state(&settings, &state, dir)?;
            Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Commands::Preview { input, json } => {
            let state = load_session(&input)?;
            let doc = document(&state);
            if json {
                println!("{}", serde_json::to_string_pretty(&doc)?);
            } else {
                print!("{}", preview::render_text(&doc));
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Init { path } => {
            write_sample_session(&path)?;
            println!("✅ Sample session written to {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config => {
            setup_config_wizard(settings)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Open => {
            open_folder_wizard(&settings.output_path())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn document(state: &AppState) -> Document {
    let totals = compute_totals(state.invoice.items(), state.config.discount(), state.config.tax());
    project(state, &totals)
}

fn load_session(path: &Path) -> Result<AppState> {
    let content = fs::read_to_string(path).with_context(|| format!("could not read {}", path.display()))?;
    let session: Session = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content).with_context(|| format!("invalid session in {}", path.display()))?,
        _ => toml::from_str(&content).with_context(|| format!("invalid session in {}", path.display()))?,
    };
    Ok(AppState::from_session(session)?)
}

fn write_sample_session(path: &Path) -> Result<()> {
    let mut state = AppState::default();
    let inv = &mut state.invoice;
    inv.update_issuer(IssuerEdit::CompanyName("Acme Studio".into()));
    inv.update_issuer(IssuerEdit::CompanyAddress("221 Market St, Springfield".into()));
    inv.update_issuer(IssuerEdit::CompanyTaxId("30-71234567-8".into()));
    inv.update_recipient(RecipientEdit::ClientName("Globex Corporation".into()));
    inv.update_recipient(RecipientEdit::ClientEmail("billing@globex.example".into()));

    let first = ItemId(1);
    inv.update_item(first, ItemEdit::Description("Website redesign".into()))?;
    inv.update_item(first, ItemEdit::Price(1200.0))?;
    inv.update_item(first, ItemEdit::Code("WEB-01".into()))?;
    let second = inv.add_item()?;
    inv.update_item(second, ItemEdit::Code("HOST-12".into()))?;
    inv.update_item(second, ItemEdit::Description("Monthly hosting".into()))?;
    inv.update_item(second, ItemEdit::Quantity(3.0))?;
    inv.update_item(second, ItemEdit::Price(25.0))?;

    state.config.set_tax_category(TaxCategory::General);
    state.config.toggle_column(Column::Code);

    let body = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::to_string_pretty(&state.to_session())?,
        _ => toml::to_string_pretty(&state.to_session())?,
    };
    fs::write(path, body).with_context(|| format!("could not write {}", path.display()))
}

/// Runs one export and reports whether a PDF was written.
fn export_state(settings: &AppSettings, state: &AppState, dir: PathBuf) -> Result<bool> {
    let template = settings::load_template(&settings::config_dir())?;
    let capture = TypstCapture::new(&template, settings.typst_bin.clone(), settings.ppi)?;
    let exporter = Exporter::new(capture, PdfEncoder::new(settings.fit));

    let result = exporter.export(state, &ConsoleNotifier, &DirectoryDownload { dir });
    tracing::debug!(state = ?exporter.state(), generating = exporter.is_generating(), "exporter settled");
    match result {
        Ok(exported) => {
            open_and_reveal(&exported.path);
            Ok(true)
        }
        Err(ExportError::Busy) => Ok(false),
        Err(e) => {
            tracing::error!(error = %e, "export failed");
            Ok(false)
        }
    }
}

// ==========================================
// Interactive session
// ==========================================

fn new_invoice(settings: &AppSettings) -> Result<ExitCode> {
    let dir = settings::config_dir();
    let defaults = settings::load_issuer_defaults(&dir)?;
    let mut state = AppState::default();
    state.invoice.set_issuer(defaults.clone());

    wizard::fill_issuer(&mut state)?;
    wizard::pick_logo(&mut state)?;
    wizard::fill_recipient(&mut state)?;
    wizard::configure(&mut state)?;
    wizard::enter_items(&mut state)?;

    loop {
        print!("{}", preview::render_text(&document(&state)));
        match wizard::review_action()? {
            ReviewAction::Export => {
                if export_state(settings, &state, settings.output_path())? {
                    offer_issuer_defaults(&dir, &state, &defaults)?;
                    return Ok(ExitCode::SUCCESS);
                }
            }
            ReviewAction::AddItem => {
                let id = state.invoice.add_item()?;
                wizard::edit_item(&mut state, id)?;
            }
            ReviewAction::EditItem => {
                if let Some(id) = wizard::pick_item(&state)? {
                    wizard::edit_item(&mut state, id)?;
                }
            }
            ReviewAction::RemoveItem => wizard::remove_item(&mut state)?,
            ReviewAction::EditParties => {
                wizard::fill_issuer(&mut state)?;
                wizard::pick_logo(&mut state)?;
                wizard::fill_recipient(&mut state)?;
            }
            ReviewAction::EditSettings => wizard::configure(&mut state)?,
            ReviewAction::Reset => {
                if Confirm::new("Discard everything and start over?").with_default(false).prompt()? {
                    state.reset();
                    state.invoice.set_issuer(defaults.clone());
                    wizard::fill_issuer(&mut state)?;
                    wizard::fill_recipient(&mut state)?;
                    wizard::enter_items(&mut state)?;
                }
            }
            ReviewAction::Quit => {
                println!("Operation cancelled.");
                return Ok(ExitCode::SUCCESS);
            }
        }
    }
}

fn offer_issuer_defaults(dir: &Path, state: &AppState, defaults: &model::Issuer) -> Result<()> {
    if state.invoice.issuer() == defaults {
        return Ok(());
    }
    if Confirm::new("Save company details as defaults?").with_default(true).prompt()? {
        settings::save_issuer_defaults(dir, state.invoice.issuer())?;
        println!("✅ Company defaults saved.");
    }
    Ok(())
}

// ==========================================
// Open Folder Logic
// ==========================================

fn open_folder_wizard(output: &Path) -> Result<()> {
    if !output.exists() {
        println!("❌ No output directory found at {}. Export an invoice first.", output.display());
        return Ok(());
    }

    let root_opt = "📂 Open Output Directory".to_string();
    let mut files: Vec<String> = fs::read_dir(output)?
        .flatten()
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "pdf"))
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    files.sort();
    files.reverse();

    let mut options = vec![root_opt.clone()];
    options.extend(files);

    match Select::new("Select Folder to Open:", options).prompt() {
        Ok(choice) if choice == root_opt => {
            println!("🚀 Opening: {:?}", output);
            open_path(output);
        }
        Ok(choice) => open_and_reveal(&output.join(choice)),
        Err(_) => println!("Operation cancelled."),
    }
    Ok(())
}

// ==========================================
// Config & Utilities
// ==========================================

fn setup_config_wizard(current: AppSettings) -> Result<AppSettings> {
    println!("\n⚙️  --- Configuration Setup ---");

    println!("📂 Opening folder picker...");
    let picked_path = rfd::FileDialog::new()
        .set_title("Select Invoice Output Directory")
        .pick_folder();

    let output_dir = if let Some(path) = picked_path {
        path.to_string_lossy().to_string()
    } else {
        println!("❌ No folder selected. Falling back to manual input.");
        Text::new("Enter Output Directory:").with_default(&current.output_dir).prompt()?
    };

    let ppi = CustomType::<f32>::new("Export resolution (ppi):")
        .with_default(current.ppi)
        .with_error_message("Please type a valid number")
        .prompt()?;

    let fits = vec!["fill", "contain"];
    let cursor = if current.fit == PageFit::Contain { 1 } else { 0 };
    let fit = match Select::new("Page fit:", fits).with_starting_cursor(cursor).prompt()? {
        "contain" => PageFit::Contain,
        _ => PageFit::Fill,
    };

    let typst_bin = Text::new("typst executable:").with_default(&current.typst_bin).prompt()?;

    let settings = AppSettings { output_dir, ppi, fit, typst_bin };
    settings::save_settings(&settings)?;
    println!("✅ Settings saved.");

    if Confirm::new("Edit company defaults now?").with_default(false).prompt()? {
        let dir = settings::config_dir();
        let defaults = settings::load_issuer_defaults(&dir)?;
        let mut state = AppState::default();
        state.invoice.set_issuer(defaults);
        wizard::fill_issuer(&mut state)?;
        wizard::pick_logo(&mut state)?;
        settings::save_issuer_defaults(&dir, state.invoice.issuer())?;
        println!("✅ Company defaults saved.");
    }

    if !settings.output_path().exists() {
        fs::create_dir_all(settings.output_path())
            .with_context(|| format!("could not create {}", settings.output_path().display()))?;
    }
    Ok(settings)
}

fn open_path(path: &Path) {
    #[cfg(target_os = "macos")]
    Command::new("open").arg(path).spawn().ok();

    #[cfg(target_os = "windows")]
    Command::new("explorer").arg(path).spawn().ok();

    #[cfg(target_os = "linux")]
    Command::new("xdg-open").arg(path).spawn().ok();
}

// Helper: Open file and reveal in Finder/Explorer
fn open_and_reveal(path: &Path) {
    #[cfg(target_os = "macos")]
    Command::new("open").arg("-R").arg(path).spawn().ok();

    #[cfg(target_os = "windows")]
    Command::new("explorer").arg(format!("/select,{}", path.to_string_lossy())).spawn().ok();

    #[cfg(target_os = "linux")]
    Command::new("xdg-open").arg(path.parent().unwrap_or(path)).spawn().ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_subcommands() {
        Cli::command().debug_assert();
        let cli = Cli::parse_from(["invoice-builder", "render", "inv.toml", "--out", "/tmp/x"]);
        match cli.command {
            Some(Commands::Render { input, out }) => {
                assert_eq!(input, PathBuf::from("inv.toml"));
                assert_eq!(out, Some(PathBuf::from("/tmp/x")));
            }
            _ => panic!("expected render"),
        }
        assert!(Cli::parse_from(["invoice-builder"]).command.is_none());
    }

    #[test]
    fn sample_session_loads_back_in_both_formats() {
        let dir = tempfile::TempDir::new().unwrap();
        for name in ["sample.toml", "sample.json"] {
            let path = dir.path().join(name);
            write_sample_session(&path).unwrap();
            let state = load_session(&path).unwrap();
            assert_eq!(state.invoice.issuer().company_name, "Acme Studio");
            assert_eq!(state.invoice.items().len(), 2);
            assert!(export::validate(&state).is_ok());
            assert!(state.config.columns().is_visible(Column::Code));
            assert_eq!(state.invoice.items()[1].code, "HOST-12");

            let totals = compute_totals(state.invoice.items(), state.config.discount(), state.config.tax());
            assert_eq!(calc::round2(totals.total), 1542.75);
        }
    }
}
