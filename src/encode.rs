use std::io::BufWriter;

use printpdf::image_crate::DynamicImage;
use printpdf::{Image, ImageTransform, Mm, PdfDocument};
use tracing::debug;

use crate::export::{Encode, EncodeError, PageFit, Raster};
use crate::render::PageSpec;

/// Wraps a captured page into a single-page PDF with no margins.
pub struct PdfEncoder {
    pub fit: PageFit,
    pub title: String,
}

impl PdfEncoder {
    pub fn new(fit: PageFit) -> Self {
        Self { fit, title: "Invoice".into() }
    }
}

/// Image placement on the page: (x, y, scale_x, scale_y), all in mm space.
pub(crate) fn placement(fit: PageFit, natural_w: f32, natural_h: f32, page: &PageSpec) -> (f32, f32, f32, f32) {
    let sx = page.width_mm / natural_w;
    let sy = page.height_mm / natural_h;
    match fit {
        PageFit::Fill => (0.0, 0.0, sx, sy),
        PageFit::Contain => {
            let s = sx.min(sy);
            let x = (page.width_mm - natural_w * s) / 2.0;
            let y = (page.height_mm - natural_h * s) / 2.0;
            (x, y, s, s)
        }
    }
}

impl Encode for PdfEncoder {
    fn encode(&self, raster: &Raster, page: &PageSpec) -> Result<Vec<u8>, EncodeError> {
        let (w_px, h_px) = (raster.image.width(), raster.image.height());
        if w_px == 0 || h_px == 0 || raster.ppi <= 0.0 {
            return Err(EncodeError::EmptyRaster);
        }

        let (doc, page1, layer1) =
            PdfDocument::new(self.title.as_str(), Mm(page.width_mm), Mm(page.height_mm), "Layer 1");
        let layer = doc.get_page(page1).get_layer(layer1);

        // printpdf sizes images as px / dpi inches
        let natural_w = w_px as f32 / raster.ppi * 25.4;
        let natural_h = h_px as f32 / raster.ppi * 25.4;
        let (x, y, scale_x, scale_y) = placement(self.fit, natural_w, natural_h, page);
        debug!(w_px, h_px, scale_x, scale_y, fit = ?self.fit, "placing page raster");

        // flatten alpha onto white
        let rgb = DynamicImage::ImageRgb8(raster.image.to_rgb8());
        Image::from_dynamic_image(&rgb).add_to_layer(
            layer,
            ImageTransform {
                translate_x: Some(Mm(x)),
                translate_y: Some(Mm(y)),
                rotate: None,
                scale_x: Some(scale_x),
                scale_y: Some(scale_y),
                dpi: Some(raster.ppi),
            },
        );

        let mut writer = BufWriter::new(Vec::<u8>::new());
        doc.save(&mut writer).map_err(|e| EncodeError::Pdf(e.to_string()))?;
        writer.into_inner().map_err(|e| EncodeError::Pdf(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::A4;
    use printpdf::image_crate::{Rgb, RgbImage};

    #[test]
    fn fill_stretches_to_the_page_edges() {
        let (x, y, sx, sy) = placement(PageFit::Fill, 100.0, 100.0, &A4);
        assert_eq!((x, y), (0.0, 0.0));
        assert!((100.0 * sx - 210.0).abs() < 1e-3);
        assert!((100.0 * sy - 297.0).abs() < 1e-3);
    }

    #[test]
    fn contain_letterboxes_and_centres() {
        let (x, y, sx, sy) = placement(PageFit::Contain, 100.0, 100.0, &A4);
        assert_eq!(sx, sy);
        assert!((x - 0.0).abs() < 1e-3);
        assert!((y - (297.0 - 210.0) / 2.0).abs() < 1e-3);
    }

    #[test]
    fn encodes_a_single_page_pdf() {
        let raster = Raster {
            image: DynamicImage::ImageRgb8(RgbImage::from_pixel(21, 30, Rgb([255, 255, 255]))),
            ppi: 10.0,
        };
        let bytes = PdfEncoder::new(PageFit::Fill).encode(&raster, &A4).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn empty_raster_is_rejected() {
        let raster = Raster { image: DynamicImage::ImageRgb8(RgbImage::new(0, 0)), ppi: 96.0 };
        assert!(matches!(
            PdfEncoder::new(PageFit::Fill).encode(&raster, &A4),
            Err(EncodeError::EmptyRaster)
        ));
    }
}
