//! # Frames and Faces
//!
//! A [`Frame`] is one captured camera image. Frames come from a
//! [`FrameSource`] and face boxes from a [`FaceLocator`]; both are external
//! collaborators, so the kiosk only depends on these traits.
//!
//! | Source | Use |
//! |--------|-----|
//! | [`SnapshotFileCamera`] | Kiosk: a preview process keeps overwriting one JPEG/PNG |
//! | [`StaticFrameSource`] | Tests and demos: one fixed image |
//!
//! | Locator | Use |
//! |---------|-----|
//! | [`NoFaces`] | Exposure correction disabled |
//! | [`FixedFace`] | Subject always stands in the same spot |
//! | [`SidecarFaces`] | Detector writes `<image>.faces.json` next to the snapshot |

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CaptureError, KioskError};

/// One captured image plus the moment it was taken.
///
/// Owned by the session that captured it; deliberately not `Clone`.
#[derive(Debug)]
pub struct Frame {
    image: DynamicImage,
    captured_at: DateTime<Utc>,
    source_path: Option<PathBuf>,
}

impl Frame {
    pub fn new(image: DynamicImage, captured_at: DateTime<Utc>) -> Self {
        Self {
            image,
            captured_at,
            source_path: None,
        }
    }

    /// Decode an image file, stamping it with the current time.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, KioskError> {
        let path = path.as_ref();
        let image = image::open(path)?;
        Ok(Self::new(image, Utc::now()).with_source(path))
    }

    /// Remember the file the frame was decoded from.
    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Color channels in the underlying buffer.
    pub fn channels(&self) -> u8 {
        self.image.color().channel_count()
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// BT.601 luma view of the frame.
    pub fn to_luma(&self) -> GrayImage {
        self.image.to_luma8()
    }
}

/// Face bounding box in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    #[serde(default = "full_confidence")]
    pub confidence: f32,
}

fn full_confidence() -> f32 {
    1.0
}

impl FaceRegion {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            confidence: 1.0,
        }
    }

    /// Intersect with a `width` x `height` frame. `None` if nothing is left.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<FaceRegion> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = self.w.min(width - self.x);
        let h = self.h.min(height - self.y);
        (w > 0 && h > 0).then_some(FaceRegion { w, h, ..*self })
    }
}

// ============================================================================
// FRAME SOURCES
// ============================================================================

/// Anything that can hand the session the most recent camera frame.
pub trait FrameSource: Send {
    /// The newest frame, or `None` if none is available yet.
    ///
    /// The session polls this until its capture timeout expires.
    fn latest_frame(&mut self) -> Result<Option<Frame>, CaptureError>;
}

/// Reads a snapshot file that an external preview process rewrites.
///
/// A missing file or one caught mid-write reads as "no frame yet".
pub struct SnapshotFileCamera {
    path: PathBuf,
    max_age: Option<Duration>,
}

impl SnapshotFileCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_age: None,
        }
    }

    /// Ignore snapshots whose modification time is older than `max_age`.
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for SnapshotFileCamera {
    fn latest_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        let meta = match std::fs::metadata(&self.path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CaptureError::Source(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let modified = meta.modified().unwrap_or_else(|_| SystemTime::now());
        if let Some(max_age) = self.max_age
            && modified.elapsed().unwrap_or_default() > max_age
        {
            debug!(path = %self.path.display(), "snapshot is stale");
            return Ok(None);
        }

        match image::open(&self.path) {
            Ok(image) => Ok(Some(
                Frame::new(image, DateTime::<Utc>::from(modified)).with_source(&self.path),
            )),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "snapshot not decodable yet");
                Ok(None)
            }
        }
    }
}

/// Always returns a copy of the same image.
pub struct StaticFrameSource {
    image: Option<DynamicImage>,
}

impl StaticFrameSource {
    pub fn new(image: DynamicImage) -> Self {
        Self { image: Some(image) }
    }

    /// A source that never produces a frame.
    pub fn empty() -> Self {
        Self { image: None }
    }
}

impl FrameSource for StaticFrameSource {
    fn latest_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        Ok(self
            .image
            .as_ref()
            .map(|image| Frame::new(image.clone(), Utc::now())))
    }
}

// ============================================================================
// FACE LOCATORS
// ============================================================================

/// Finds faces in a frame. Called once per captured frame.
pub trait FaceLocator: Send + Sync {
    fn locate(&self, frame: &Frame) -> Vec<FaceRegion>;
}

/// Never finds a face; exposure stays at gain 1.0.
pub struct NoFaces;

impl FaceLocator for NoFaces {
    fn locate(&self, _frame: &Frame) -> Vec<FaceRegion> {
        Vec::new()
    }
}

/// Always reports the same box.
pub struct FixedFace(pub FaceRegion);

impl FaceLocator for FixedFace {
    fn locate(&self, _frame: &Frame) -> Vec<FaceRegion> {
        vec![self.0]
    }
}

/// Reads boxes from a JSON file next to the image.
///
/// For `photo.jpg` the detector writes `photo.jpg.faces.json`:
///
/// ```json
/// [{ "x": 120, "y": 80, "w": 96, "h": 96, "confidence": 0.92 }]
/// ```
///
/// A missing or unreadable sidecar means no faces.
pub struct SidecarFaces {
    min_confidence: f32,
}

impl SidecarFaces {
    pub fn new(min_confidence: f32) -> Self {
        Self { min_confidence }
    }

    pub fn sidecar_path(image_path: &Path) -> PathBuf {
        let mut name = image_path.as_os_str().to_owned();
        name.push(".faces.json");
        PathBuf::from(name)
    }
}

impl Default for SidecarFaces {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl FaceLocator for SidecarFaces {
    fn locate(&self, frame: &Frame) -> Vec<FaceRegion> {
        let Some(image_path) = frame.source_path() else {
            return Vec::new();
        };
        let sidecar = Self::sidecar_path(image_path);
        let text = match std::fs::read_to_string(&sidecar) {
            Ok(text) => text,
            Err(_) => return Vec::new(),
        };

        match serde_json::from_str::<Vec<FaceRegion>>(&text) {
            Ok(faces) => faces
                .into_iter()
                .filter(|f| f.confidence >= self.min_confidence)
                .collect(),
            Err(e) => {
                warn!(path = %sidecar.display(), error = %e, "ignoring malformed face sidecar");
                Vec::new()
            }
        }
    }
}
