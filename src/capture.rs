//! Page capture through typst.
//!
//! The [`Document`] is rendered into typst source with tera, then `typst
//! compile` rasterizes it to a PNG at a fixed resolution.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;

use printpdf::image_crate::{self, ImageFormat};
use tera::{Context, Tera, Value};
use tracing::{debug, warn};

use crate::export::{Capture, CaptureError, Raster};
use crate::logo::Logo;
use crate::render::Document;

pub const DEFAULT_TEMPLATE: &str = include_str!("../templates/invoice.typ.tera");
const TEMPLATE_NAME: &str = "invoice.typ";

/// Quotes a value as a typst string literal.
pub(crate) fn typst_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn typst_str(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = match value {
        Value::String(s) => typst_quote(s),
        Value::Null => typst_quote(""),
        other => typst_quote(&other.to_string()),
    };
    Ok(Value::String(s))
}

pub struct TypstCapture {
    tera: Tera,
    typst_bin: String,
    ppi: f32,
}

impl TypstCapture {
    pub fn new(template: &str, typst_bin: impl Into<String>, ppi: f32) -> Result<Self, CaptureError> {
        let mut tera = Tera::default();
        tera.register_filter("typst_str", typst_str);
        tera.add_raw_template(TEMPLATE_NAME, template)?;
        Ok(Self { tera, typst_bin: typst_bin.into(), ppi })
    }

    pub fn render_source(&self, doc: &Document, logo_file: Option<&str>) -> Result<String, CaptureError> {
        let mut context = Context::from_serialize(doc)?;
        context.insert("logo_file", &logo_file);
        Ok(self.tera.render(TEMPLATE_NAME, &context)?)
    }

    /// Re-encodes the logo as PNG next to the source. A bad logo is skipped.
    fn write_logo(logo: &Logo, dir: &Path) -> Option<&'static str> {
        const NAME: &str = "logo.png";
        let written = logo
            .decode()
            .map_err(|e| e.to_string())
            .and_then(|bytes| image_crate::load_from_memory(&bytes).map_err(|e| e.to_string()))
            .and_then(|img| img.save_with_format(dir.join(NAME), ImageFormat::Png).map_err(|e| e.to_string()));
        match written {
            Ok(()) => Some(NAME),
            Err(e) => {
                warn!(error = %e, "logo could not be decoded, rendering without it");
                None
            }
        }
    }
}

impl Capture for TypstCapture {
    fn capture(&self, doc: &Document) -> Result<Raster, CaptureError> {
        let scratch = tempfile::Builder::new().prefix("invoice-builder-").tempdir()?;
        let logo_file = doc.header.logo.as_ref().and_then(|l| Self::write_logo(l, scratch.path()));

        let source = self.render_source(doc, logo_file)?;
        let typ_path = scratch.path().join("invoice.typ");
        let png_path = scratch.path().join("invoice.png");
        fs::write(&typ_path, source)?;

        debug!(bin = %self.typst_bin, ppi = self.ppi, "compiling page");
        let output = Command::new(&self.typst_bin)
            .arg("compile")
            .arg("--format")
            .arg("png")
            .arg("--ppi")
            .arg(self.ppi.to_string())
            .arg(&typ_path)
            .arg(&png_path)
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => CaptureError::ToolMissing(self.typst_bin.clone()),
                _ => CaptureError::Io(e),
            })?;
        if !output.status.success() {
            return Err(CaptureError::Render(String::from_utf8_lossy(&output.stderr).trim().to_string()));
        }

        let image = image_crate::open(&png_path)?;
        Ok(Raster { image, ppi: self.ppi })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use crate::calc::compute_totals;
    use crate::model::{Column, ItemId};
    use crate::render::project;
    use crate::store::{AppState, IssuerEdit, ItemEdit};

    fn doc(state: &AppState) -> Document {
        let totals = compute_totals(state.invoice.items(), state.config.discount(), state.config.tax());
        project(state, &totals)
    }

    fn capture() -> TypstCapture {
        TypstCapture::new(DEFAULT_TEMPLATE, "typst", 96.0).unwrap()
    }

    #[test]
    fn quotes_are_escaped() {
        assert_eq!(typst_quote(r#"Acme "Best" \ Co"#), r#""Acme \"Best\" \\ Co""#);
        assert_eq!(typst_quote("a\nb"), r#""a\nb""#);
    }

    #[test]
    fn source_contains_escaped_user_text() {
        let mut state = AppState::default();
        state.invoice.update_issuer(IssuerEdit::CompanyName("Acme \"Tools\" #1".into()));
        state.invoice.update_item(ItemId(1), ItemEdit::Description("Setup $fee".into())).unwrap();

        let source = capture().render_source(&doc(&state), None).unwrap();

        assert!(source.contains(r#""Acme \"Tools\" #1""#));
        assert!(source.contains(r#""Setup $fee""#));
        assert!(source.contains(r#""INVOICE""#));
        assert!(source.contains("width: 210mm") || source.contains("width: 210.0mm"));
        assert!(!source.contains("image("));
    }

    #[test]
    fn source_follows_visible_columns() {
        let mut state = AppState::default();
        state.config.toggle_column(Column::Code);
        let source = capture().render_source(&doc(&state), None).unwrap();
        assert!(source.contains("columns: (auto, 1fr, auto, auto, auto, )"));
        assert!(source.contains(r#""Code""#));
    }

    #[test]
    fn logo_is_referenced_when_written() {
        let source = capture().render_source(&doc(&AppState::default()), Some("logo.png")).unwrap();
        assert!(source.contains(r#"image("logo.png""#));
    }

    #[test]
    fn undecodable_logo_is_skipped() {
        let dir = TempDir::new().unwrap();
        let bad: Logo = serde_json::from_str("\"data:image/png;base64,AAAA\"").unwrap();
        assert_eq!(TypstCapture::write_logo(&bad, dir.path()), None);

        let good = Logo::from_bytes(&crate::logo::tests::tiny_png()).unwrap();
        assert_eq!(TypstCapture::write_logo(&good, dir.path()), Some("logo.png"));
        assert!(dir.path().join("logo.png").exists());
    }

    #[test]
    fn missing_binary_is_a_capture_error() {
        let capture = TypstCapture::new(DEFAULT_TEMPLATE, "definitely-not-typst-xyz", 96.0).unwrap();
        let err = capture.capture(&doc(&AppState::default())).unwrap_err();
        assert!(matches!(err, CaptureError::ToolMissing(_)));
    }
}
