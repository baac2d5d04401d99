//! Lab-record document assembly: uploaded images rendered one per A4 page.
//!
//! Images are ordered lexicographically by filename, scaled to fit the page
//! with a margin, and JPEG-embedded. If the finished document exceeds the
//! portal's 1 MB upload limit, the whole document is rebuilt at higher
//! compression and a tighter scale cap.

use anyhow::{Context, Result};
use printpdf::image_crate::codecs::jpeg::{JpegDecoder, JpegEncoder};
use printpdf::image_crate::imageops::FilterType;
use printpdf::image_crate::{DynamicImage, GenericImageView, load_from_memory};
use printpdf::{Image, ImageTransform, Mm, PdfDocument};
use std::io::Cursor;
use tracing::{debug, warn};

const PAGE_WIDTH_MM: f64 = 210.0;
const PAGE_HEIGHT_MM: f64 = 297.0;
const MARGIN_MM: f64 = 14.0;

/// Portal-side upload limit the document must stay under.
const MAX_DOCUMENT_BYTES: usize = 1024 * 1024;

/// One uploaded image file, as received from the form.
pub struct UploadedImage {
    pub filename: String,
    pub bytes: Vec<u8>,
}

struct RenderSettings {
    jpeg_quality: u8,
    scale_cap: f64,
    raster_dpi: f64,
}

/// First pass favors fidelity; the rebuild trades resolution for size.
const FIRST_PASS: RenderSettings = RenderSettings {
    jpeg_quality: 85,
    scale_cap: 1.0,
    raster_dpi: 150.0,
};
const COMPACT_PASS: RenderSettings = RenderSettings {
    jpeg_quality: 60,
    scale_cap: 0.8,
    raster_dpi: 96.0,
};

/// Build the lab-record PDF from uploaded images.
pub fn images_to_pdf(mut images: Vec<UploadedImage>) -> Result<Vec<u8>> {
    images.sort_by(|a, b| a.filename.cmp(&b.filename));

    let document = render(&images, &FIRST_PASS)?;
    if document.len() <= MAX_DOCUMENT_BYTES {
        return Ok(document);
    }

    debug!(
        bytes = document.len(),
        limit = MAX_DOCUMENT_BYTES,
        "document over size limit, rebuilding compressed"
    );
    render(&images, &COMPACT_PASS)
}

fn render(images: &[UploadedImage], settings: &RenderSettings) -> Result<Vec<u8>> {
    let (doc, first_page, first_layer) =
        PdfDocument::new("Lab Record", Mm(PAGE_WIDTH_MM as f32), Mm(PAGE_HEIGHT_MM as f32), "Layer 1");

    let mut placed = 0usize;
    for image in images {
        let jpeg = match prepare_jpeg(&image.bytes, settings) {
            Ok(prepared) => prepared,
            Err(e) => {
                // A single unreadable upload should not sink the document.
                warn!(filename = %image.filename, error = %e, "skipping unreadable image");
                continue;
            }
        };

        let (page, layer) = if placed == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(Mm(PAGE_WIDTH_MM as f32), Mm(PAGE_HEIGHT_MM as f32), "Layer 1")
        };
        placed += 1;

        let decoder = JpegDecoder::new(Cursor::new(jpeg.bytes.as_slice()))
            .context("re-reading prepared JPEG")?;
        let pdf_image = Image::try_from(decoder).context("embedding image")?;

        let width_mm = f64::from(jpeg.width) * 25.4 / settings.raster_dpi;
        let height_mm = f64::from(jpeg.height) * 25.4 / settings.raster_dpi;
        pdf_image.add_to_layer(
            doc.get_page(page).get_layer(layer),
            ImageTransform {
                translate_x: Some(Mm(((PAGE_WIDTH_MM - width_mm) / 2.0) as f32)),
                translate_y: Some(Mm(((PAGE_HEIGHT_MM - height_mm) / 2.0) as f32)),
                dpi: Some(settings.raster_dpi as f32),
                ..ImageTransform::default()
            },
        );
    }

    doc.save_to_bytes().context("serializing PDF")
}

struct PreparedJpeg {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
}

/// Decode an upload, fit it inside the printable box at the pass's raster
/// density, and re-encode as JPEG.
fn prepare_jpeg(bytes: &[u8], settings: &RenderSettings) -> Result<PreparedJpeg> {
    let decoded = load_from_memory(bytes).context("decoding uploaded image")?;
    let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());
    let (width, height) = rgb.dimensions();

    let box_width_px = (PAGE_WIDTH_MM - 2.0 * MARGIN_MM) / 25.4 * settings.raster_dpi;
    let box_height_px = (PAGE_HEIGHT_MM - 2.0 * MARGIN_MM) / 25.4 * settings.raster_dpi;
    let scale = (box_width_px / f64::from(width))
        .min(box_height_px / f64::from(height))
        .min(settings.scale_cap);

    let new_width = ((f64::from(width) * scale) as u32).max(1);
    let new_height = ((f64::from(height) * scale) as u32).max(1);
    let fitted = if new_width < width || new_height < height {
        rgb.resize_exact(new_width, new_height, FilterType::Lanczos3)
    } else {
        rgb
    };

    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, settings.jpeg_quality)
        .encode_image(&fitted)
        .context("encoding JPEG")?;
    Ok(PreparedJpeg {
        bytes: encoded,
        width: new_width,
        height: new_height,
    })
}
