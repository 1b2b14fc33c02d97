//! # Receipt Compositor
//!
//! Lays out one complete receipt as a single monochrome canvas exactly as
//! wide as the printer head:
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ ▬▬▬ ▬▬▬ ▬▬▬ ▬▬▬ ▬▬▬ ▬▬▬ ▬▬▬  │  dotted rules
//! │        STORE NAME            │  x2, bold
//! │   subtitle / location / @    │
//! │ ▬▬▬ ▬▬▬ ▬▬▬ ▬▬▬ ▬▬▬ ▬▬▬ ▬▬▬  │
//! ├──────────────────────────────┤
//! │                              │
//! │     photo (exposed, dithered)│  center-cropped to photo_max_height
//! │                              │
//! ├──────────────────────────────┤
//! │  Thank you for shopping...   │  footer
//! │           ▓▓▓▓▓▓             │  QR code, centered, quiet zone
//! └──────────────────────────────┘
//! ```
//!
//! The total height is checked against `layout.max_height`; an oversized
//! receipt fails with [`LayoutError::Overflow`] instead of being truncated.

use image::{GrayImage, imageops, imageops::FilterType};
use tracing::debug;

use super::canvas::MonochromeCanvas;
use super::dither;
use super::font::{self, TextLine};
use crate::config::{LayoutSettings, QrSettings, Settings, StoreSettings};
use crate::error::LayoutError;
use crate::exposure;
use crate::frame::Frame;
use crate::qr::{QrBitmap, QrPayload};

/// Choose the module size for `bitmap` on a `width`-dot line.
///
/// Starts from the configured module size and shrinks it until the code plus
/// quiet zone fits; fails if even one dot per module is too wide.
pub fn fit_qr(
    source: &str,
    bitmap: QrBitmap,
    width: usize,
    settings: &QrSettings,
) -> Result<QrPayload, LayoutError> {
    let total_modules = bitmap.size() + 2 * settings.quiet_zone;
    let module_dots = settings.module_dots.min(width / total_modules.max(1));
    if module_dots == 0 {
        return Err(LayoutError::QrTooWide {
            modules: total_modules,
            width,
        });
    }
    if module_dots < settings.module_dots {
        debug!(
            configured = settings.module_dots,
            used = module_dots,
            "QR module size reduced to fit"
        );
    }

    Ok(QrPayload {
        source: source.to_string(),
        bitmap,
        module_dots,
    })
}

/// Draw a QR code centered on a `width`-dot band including its quiet zone.
pub fn render_qr(qr: &QrPayload, quiet_zone: usize, width: usize) -> MonochromeCanvas {
    let dots = qr.module_dots;
    let size = qr.bitmap.size();
    let side = (size + 2 * quiet_zone) * dots;
    let origin_x = width.saturating_sub(side) / 2 + quiet_zone * dots;
    let origin_y = quiet_zone * dots;

    let mut canvas = MonochromeCanvas::new(width, side);
    for my in 0..size {
        for mx in 0..size {
            if qr.bitmap.is_dark(mx, my) {
                canvas.fill_rect(origin_x + mx * dots, origin_y + my * dots, dots, dots);
            }
        }
    }
    canvas
}

/// Expose, flip, scale and dither the photo to `width` dots.
pub fn render_photo(
    frame: &Frame,
    gain: f32,
    width: usize,
    layout: &LayoutSettings,
) -> Result<MonochromeCanvas, LayoutError> {
    if frame.width() == 0 || frame.height() == 0 || width == 0 {
        return Err(LayoutError::EmptyFrame);
    }

    let mut gray = frame.to_luma();
    exposure::apply_gain(&mut gray, gain);

    if layout.flip_vertical {
        imageops::flip_vertical_in_place(&mut gray);
    }
    if layout.flip_horizontal {
        imageops::flip_horizontal_in_place(&mut gray);
    }

    let gray = scale_to_width(&gray, width as u32, layout.photo_max_height as u32);
    let (w, h) = (gray.width() as usize, gray.height() as usize);

    let intensities: Vec<f32> = gray
        .pixels()
        .map(|p| 1.0 - (p.0[0] as f32 / 255.0))
        .collect();
    let data = dither::dither_buffer(&intensities, w, h, layout.dithering);

    MonochromeCanvas::from_packed(w, h, data).ok_or(LayoutError::EmptyFrame)
}

/// Resize to `width` preserving aspect ratio, then center-crop rows beyond
/// `max_height`.
fn scale_to_width(gray: &GrayImage, width: u32, max_height: u32) -> GrayImage {
    let aspect = gray.height() as f32 / gray.width() as f32;
    let scaled_height = ((width as f32 * aspect).round() as u32).max(1);
    let resized = imageops::resize(gray, width, scaled_height, FilterType::Lanczos3);

    if scaled_height <= max_height {
        return resized;
    }
    let top = (scaled_height - max_height) / 2;
    imageops::crop_imm(&resized, 0, top, width, max_height).to_image()
}

/// Store header: name, subtitle, location, social handle between dotted rules.
pub fn render_header(store: &StoreSettings, width: usize, rules: bool) -> MonochromeCanvas {
    let mut canvas = MonochromeCanvas::new(width, 0);
    if rules {
        canvas.append(&font::dotted_rule(width, 8, 30, 4, 2, 2));
        canvas.append(&font::dotted_rule(width, 10, 3, 3, 2, 1));
    }

    canvas.append(&font::render_lines(
        &[
            TextLine::new(store.name.as_str()).scale(2).bold(),
            TextLine::new(store.subtitle.as_str()),
            TextLine::new(store.location.as_str()),
            TextLine::new(store.social.as_str()),
        ],
        width,
    ));

    if rules {
        canvas.append(&font::dotted_rule(width, 8, 3, 3, 2, 1));
        canvas.append(&font::dotted_rule(width, 20, 30, 4, 2, 2));
    }
    canvas
}

/// Compose the full receipt.
pub fn compose(
    frame: &Frame,
    gain: f32,
    qr: &QrPayload,
    settings: &Settings,
) -> Result<MonochromeCanvas, LayoutError> {
    let width = settings.printer.width_dots as usize;
    let spacing = settings.layout.spacing;

    let header = render_header(&settings.store, width, settings.layout.rules);
    let photo = render_photo(frame, gain, width, &settings.layout)?;
    let footer = font::render_lines(&[TextLine::new(settings.store.footer.as_str())], width);
    let code = render_qr(qr, settings.qr.quiet_zone, width);

    let height = header.height() + photo.height() + footer.height() + code.height() + 2 * spacing;
    if height > settings.layout.max_height {
        return Err(LayoutError::Overflow {
            height,
            max: settings.layout.max_height,
        });
    }

    let mut canvas = header;
    canvas.append_blank(spacing);
    canvas.append(&photo);
    canvas.append_blank(spacing);
    canvas.append(&footer);
    canvas.append(&code);

    debug!(
        width = canvas.width(),
        height = canvas.height(),
        photo_rows = photo.height(),
        "receipt composed"
    );
    Ok(canvas)
}
