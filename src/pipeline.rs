//! # Capture-to-Print Pipeline
//!
//! The pure half of a session: frame in, print job out. The session
//! controller, the `convert` command and the `batch` tool all call
//! [`process`], so a file converted offline produces exactly the bytes the
//! kiosk would print for the same frame.
//!
//! ```text
//! Frame ──► exposure gain ──┐
//!                           ├──► compositor ──► ESC/POS codec ──► PrintJob
//! store URL ──► QR encoder ─┘
//! ```

use std::path::Path;

use tracing::debug;

use crate::config::Settings;
use crate::error::KioskError;
use crate::exposure;
use crate::frame::{FaceLocator, FaceRegion, Frame};
use crate::protocol::{PrintJob, raster};
use crate::qr::{self, QrPayload};
use crate::render::MonochromeCanvas;
use crate::render::compositor;

/// Everything produced for one frame.
#[derive(Debug)]
pub struct Processed {
    pub gain: f32,
    pub qr: QrPayload,
    pub canvas: MonochromeCanvas,
    pub job: PrintJob,
}

/// Build the QR payload for the configured store URL.
pub fn store_qr(settings: &Settings) -> Result<QrPayload, KioskError> {
    let url = &settings.store.qr_url;
    let bitmap = qr::encode(url, settings.qr.error_correction)?;
    Ok(compositor::fit_qr(
        url,
        bitmap,
        settings.printer.width_dots as usize,
        &settings.qr,
    )?)
}

/// Run estimator, QR encoder, compositor and codec in order.
pub fn process(frame: &Frame, faces: &[FaceRegion], settings: &Settings) -> Result<Processed, KioskError> {
    let gain = exposure::estimate_gain(&frame.to_luma(), faces, &settings.exposure);
    let qr = store_qr(settings)?;
    let canvas = compositor::compose(frame, gain, &qr, settings)?;
    let job = raster::encode(&canvas, &settings.printer, &settings.codec)?;

    debug!(
        gain,
        faces = faces.len(),
        rows = canvas.height(),
        bytes = job.len(),
        bands = job.bands(),
        "frame processed"
    );

    Ok(Processed {
        gain,
        qr,
        canvas,
        job,
    })
}

/// Load an image file and process it, asking `locator` for faces.
pub fn process_file(
    path: &Path,
    locator: &dyn FaceLocator,
    settings: &Settings,
) -> Result<Processed, KioskError> {
    let frame = Frame::open(path)?;
    let faces = locator.locate(&frame);
    process(&frame, &faces, settings)
}
