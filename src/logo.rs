//! Company logo, kept as a self-contained `data:` URL.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use printpdf::image_crate::{self, ImageFormat};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_LOGO_BYTES: u64 = 2 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum LogoError {
    #[error("The file is too large ({size} bytes). Maximum 2MB.")]
    TooLarge { size: u64 },
    #[error("Only image files are allowed.")]
    NotAnImage,
    #[error("Malformed logo data")]
    Malformed,
    #[error("Could not read logo: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(transparent)]
pub struct Logo {
    data_url: String,
}

fn data_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^data:(image/[A-Za-z0-9.+-]+);base64,([A-Za-z0-9+/=\s]*)$")
            .expect("valid data url pattern")
    })
}

fn mime_for(format: ImageFormat) -> Option<mime::Mime> {
    match format {
        ImageFormat::Png => Some(mime::IMAGE_PNG),
        ImageFormat::Jpeg => Some(mime::IMAGE_JPEG),
        ImageFormat::Gif => Some(mime::IMAGE_GIF),
        ImageFormat::Bmp => Some(mime::IMAGE_BMP),
        ImageFormat::WebP => "image/webp".parse().ok(),
        ImageFormat::Tiff => "image/tiff".parse().ok(),
        _ => None,
    }
}

impl Logo {
    /// Validates size and content type, then embeds the bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LogoError> {
        let size = bytes.len() as u64;
        if size > MAX_LOGO_BYTES {
            return Err(LogoError::TooLarge { size });
        }
        let format = image_crate::guess_format(bytes).map_err(|_| LogoError::NotAnImage)?;
        let mime = mime_for(format).ok_or(LogoError::NotAnImage)?;
        Ok(Self {
            data_url: format!("data:{};base64,{}", mime, STANDARD.encode(bytes)),
        })
    }

    /// Checks the size before reading so oversized files are never loaded.
    pub fn from_path(path: &Path) -> Result<Self, LogoError> {
        let size = fs::metadata(path)?.len();
        if size > MAX_LOGO_BYTES {
            return Err(LogoError::TooLarge { size });
        }
        Self::from_bytes(&fs::read(path)?)
    }

    pub fn mime(&self) -> Option<&str> {
        data_url_re()
            .captures(&self.data_url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    pub fn decode(&self) -> Result<Vec<u8>, LogoError> {
        let caps = data_url_re().captures(&self.data_url).ok_or(LogoError::Malformed)?;
        let payload: String = caps[2].chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD.decode(payload).map_err(|_| LogoError::Malformed)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use printpdf::image_crate::{DynamicImage, RgbImage};
    use std::io::Cursor;

    pub(crate) fn tiny_png() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn embeds_png_as_data_url() {
        let png = tiny_png();
        let logo = Logo::from_bytes(&png).unwrap();
        assert!(logo.data_url.starts_with("data:image/png;base64,"));
        assert_eq!(logo.mime(), Some("image/png"));
        assert_eq!(logo.decode().unwrap(), png);
    }

    #[test]
    fn rejects_non_images() {
        let err = Logo::from_bytes(b"%PDF-1.4 not an image").unwrap_err();
        assert!(matches!(err, LogoError::NotAnImage));
    }

    #[test]
    fn rejects_oversized_files() {
        let mut big = tiny_png();
        big.resize(MAX_LOGO_BYTES as usize + 1, 0);
        let err = Logo::from_bytes(&big).unwrap_err();
        assert!(matches!(err, LogoError::TooLarge { .. }));
    }

    #[test]
    fn malformed_data_url_fails_to_decode() {
        let logo: Logo = serde_json::from_str("\"data:text/plain;base64,aGk=\"").unwrap();
        assert!(matches!(logo.decode(), Err(LogoError::Malformed)));
        assert_eq!(logo.mime(), None);
    }
}
