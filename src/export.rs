//! PDF export: validate, capture the rendered page, encode it, save it.
//!
//! Capture and encoding are pluggable services. [`Exporter`] only drives the
//! state machine and makes sure a single export is in flight at a time.

use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::NaiveDate;
use printpdf::image_crate::DynamicImage;
use serde::{Deserialize, Serialize};
use slug::slugify;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn};

use crate::calc::compute_totals;
use crate::model::{Issuer, Recipient};
use crate::notify::{Notice, Notify};
use crate::render::{self, Document, PageSpec};
use crate::store::AppState;

const GENERIC_FAILURE: &str = "Could not generate the PDF. Please try again.";

/// A pixel snapshot of the rendered page.
#[derive(Debug, Clone)]
pub struct Raster {
    pub image: DynamicImage,
    pub ppi: f32,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("'{0}' is not installed or not on PATH")]
    ToolMissing(String),
    #[error("template error: {0}")]
    Template(#[from] tera::Error),
    #[error("renderer failed: {0}")]
    Render(String),
    #[error("could not load captured page: {0}")]
    Image(#[from] printpdf::image_crate::ImageError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("empty raster")]
    EmptyRaster,
    #[error("pdf encoding failed: {0}")]
    Pdf(String),
}

pub trait Capture: Sync {
    fn capture(&self, doc: &Document) -> Result<Raster, CaptureError>;
}

pub trait Encode: Sync {
    fn encode(&self, raster: &Raster, page: &PageSpec) -> Result<Vec<u8>, EncodeError>;
}

/// Where finished files go.
pub trait Download: Sync {
    fn save(&self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf>;
}

pub struct DirectoryDownload {
    pub dir: PathBuf,
}

impl Download for DirectoryDownload {
    fn save(&self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageFit {
    /// Stretch the raster over the whole page, no margins.
    #[default]
    Fill,
    /// Keep aspect ratio and centre it.
    Contain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportState {
    #[default]
    Idle,
    Validating,
    Capturing,
    Encoding,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    MissingIssuerName,
    MissingRecipientName,
    NoBillableItem,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Violation::MissingIssuerName => "Company name is required",
            Violation::MissingRecipientName => "Client name is required",
            Violation::NoBillableItem => {
                "At least one item needs a description, a quantity above 0 and a price above 0"
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<Violation>);

impl std::error::Error for ValidationErrors {}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Please complete the following before exporting:")?;
        for v in &self.0 {
            write!(f, "\n  - {v}")?;
        }
        Ok(())
    }
}

/// Collects every missing requirement, not just the first.
pub fn validate(state: &AppState) -> Result<(), ValidationErrors> {
    let mut violations = Vec::new();
    if state.invoice.issuer().company_name.trim().is_empty() {
        violations.push(Violation::MissingIssuerName);
    }
    if state.invoice.recipient().client_name.trim().is_empty() {
        violations.push(Violation::MissingRecipientName);
    }
    if !state.invoice.items().iter().any(|i| i.is_billable()) {
        violations.push(Violation::NoBillableItem);
    }
    if violations.is_empty() { Ok(()) } else { Err(ValidationErrors(violations)) }
}

pub fn file_name(issuer: &Issuer, recipient: &Recipient, date: NaiveDate) -> String {
    let part = |value: &str, fallback: &str| {
        let s = slugify(value);
        if s.is_empty() { fallback.to_string() } else { s }
    };
    format!(
        "Invoice_{}_{}_{}.pdf",
        part(&issuer.company_name, "company"),
        part(&recipient.client_name, "client"),
        date.format("%Y-%m-%d")
    )
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("an export is already in progress")]
    Busy,
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),
    #[error("encoding failed: {0}")]
    Encode(#[from] EncodeError),
    #[error("could not save the PDF: {0}")]
    Save(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exported {
    pub path: PathBuf,
    pub bytes: usize,
}

/// Releases the in-flight flag however the export ends.
struct GeneratingGuard<'a>(&'a AtomicBool);

impl Drop for GeneratingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Exporter<C, E> {
    capture: C,
    encode: E,
    page: PageSpec,
    generating: AtomicBool,
    state: Mutex<ExportState>,
}

impl<C: Capture, E: Encode> Exporter<C, E> {
    pub fn new(capture: C, encode: E) -> Self {
        Self {
            capture,
            encode,
            page: render::A4,
            generating: AtomicBool::new(false),
            state: Mutex::new(ExportState::Idle),
        }
    }

    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::Acquire)
    }

    pub fn state(&self) -> ExportState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transition(&self, next: ExportState) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        debug!(from = ?*state, to = ?next, "export state");
        *state = next;
    }

    pub fn export(
        &self,
        app: &AppState,
        notifier: &dyn Notify,
        download: &dyn Download,
    ) -> Result<Exported, ExportError> {
        self.export_on(app, notifier, download, chrono::Local::now().date_naive())
    }

    pub fn export_on(
        &self,
        app: &AppState,
        notifier: &dyn Notify,
        download: &dyn Download,
        date: NaiveDate,
    ) -> Result<Exported, ExportError> {
        if self
            .generating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("export requested while another is running");
            notifier.notify(Notice::info("A PDF is already being generated."));
            return Err(ExportError::Busy);
        }
        let _guard = GeneratingGuard(&self.generating);
        let _span = info_span!("export").entered();

        let result = self.run(app, download, date);
        match &result {
            Ok(exported) => {
                self.transition(ExportState::Done);
                info!(path = %exported.path.display(), bytes = exported.bytes, "pdf exported");
                notifier.notify(Notice::success(format!("PDF saved: {}", exported.path.display())));
            }
            Err(err) => {
                self.transition(ExportState::Failed);
                match err {
                    ExportError::Invalid(violations) => notifier.notify(Notice::error(violations.to_string())),
                    ExportError::Save(e) => {
                        error!(error = %e, "saving pdf failed");
                        notifier.notify(Notice::error(format!("Could not save the PDF: {e}")));
                    }
                    other => {
                        error!(error = %other, "pdf generation failed");
                        notifier.notify(Notice::error(GENERIC_FAILURE));
                    }
                }
            }
        }
        self.transition(ExportState::Idle);
        result
    }

    fn run(&self, app: &AppState, download: &dyn Download, date: NaiveDate) -> Result<Exported, ExportError> {
        self.transition(ExportState::Validating);
        validate(app)?;

        let totals = compute_totals(app.invoice.items(), app.config.discount(), app.config.tax());
        let doc = render::project(app, &totals);

        self.transition(ExportState::Capturing);
        let started = Instant::now();
        let raster = self.capture.capture(&doc)?;
        debug!(
            width = raster.image.width(),
            height = raster.image.height(),
            expected = ?self.page.pixels_at(raster.ppi),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "page captured"
        );

        self.transition(ExportState::Encoding);
        let bytes = self.encode.encode(&raster, &self.page)?;

        let name = file_name(app.invoice.issuer(), app.invoice.recipient(), date);
        let path = download.save(&name, &bytes)?;
        Ok(Exported { path, bytes: bytes.len() })
    }
}
