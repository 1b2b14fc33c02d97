//! # Kiosk Settings
//!
//! One immutable [`Settings`] value is built before the kiosk starts and
//! handed to every component that needs it. Nothing in the pipeline reads
//! the environment or the filesystem for configuration.
//!
//! Settings are deserialised from TOML; every section and field has a
//! default, so an empty file is a valid configuration:
//!
//! ```toml
//! [store]
//! name = "Corner Bakery"
//! qr_url = "https://corner.example"
//!
//! [session]
//! countdown_secs = 5
//!
//! [exposure]
//! target_low = 150.0
//! target_high = 210.0
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::printer::PrinterConfig;
use crate::protocol::CutMode;
use crate::qr::QrLevel;
use crate::render::dither::DitheringAlgorithm;

/// Complete kiosk configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub printer: PrinterConfig,
    pub exposure: ExposureSettings,
    pub layout: LayoutSettings,
    pub qr: QrSettings,
    pub codec: CodecSettings,
    pub session: SessionSettings,
    pub transport: TransportSettings,
}

/// Receipt branding printed on every receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub name: String,
    pub subtitle: String,
    pub location: String,
    pub social: String,
    /// Target of the QR code at the bottom of the receipt.
    pub qr_url: String,
    pub footer: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            name: "My Store".to_string(),
            subtitle: "Tagline or market name".to_string(),
            location: "City, State".to_string(),
            social: "@mystore".to_string(),
            qr_url: "https://example.com".to_string(),
            footer: "Thank you for shopping with us!".to_string(),
        }
    }
}

/// How the face region is summarised into one luminance value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LuminanceStatistic {
    /// Arithmetic mean of the region.
    Mean,
    /// Percentile of the region after trimming the 5th/95th percentile outliers.
    Percentile { percentile: f32 },
}

/// Exposure correction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposureSettings {
    /// Derive the gain from the face region. When false `manual_gain` is used.
    pub auto: bool,
    pub manual_gain: f32,
    /// Lower edge of the acceptable face luminance band (0-255).
    pub target_low: f32,
    /// Upper edge of the acceptable face luminance band (0-255).
    pub target_high: f32,
    pub min_gain: f32,
    pub max_gain: f32,
    pub statistic: LuminanceStatistic,
}

impl Default for ExposureSettings {
    fn default() -> Self {
        Self {
            auto: true,
            manual_gain: 1.5,
            target_low: 150.0,
            target_high: 210.0,
            min_gain: 0.5,
            max_gain: 3.0,
            statistic: LuminanceStatistic::Mean,
        }
    }
}

/// Receipt layout parameters. All sizes are in printer dots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    /// Longest receipt the compositor may produce.
    pub max_height: usize,
    /// Photo region height; taller photos are center-cropped.
    pub photo_max_height: usize,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    pub dithering: DitheringAlgorithm,
    /// Vertical gap between layout blocks.
    pub spacing: usize,
    /// Draw the dotted rules around the store header.
    pub rules: bool,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            max_height: 3000,
            photo_max_height: 900,
            flip_horizontal: true,
            flip_vertical: false,
            dithering: DitheringAlgorithm::Bayer,
            spacing: 12,
            rules: true,
        }
    }
}

/// QR code parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrSettings {
    pub error_correction: QrLevel,
    /// Dots per module; reduced (never below 1) when the code would not fit.
    pub module_dots: usize,
    /// Quiet zone in modules.
    pub quiet_zone: usize,
}

impl Default for QrSettings {
    fn default() -> Self {
        Self {
            error_correction: QrLevel::M,
            module_dots: 6,
            quiet_zone: 4,
        }
    }
}

/// Print stream framing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecSettings {
    /// Lines fed after the image so the cut clears the QR code.
    pub feed_lines: u8,
    pub cut: CutMode,
}

impl Default for CodecSettings {
    fn default() -> Self {
        Self {
            feed_lines: 6,
            cut: CutMode::Full,
        }
    }
}

/// Session timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub countdown_secs: u32,
    pub capture_timeout_ms: u64,
    /// How long the error screen stays up before returning to idle.
    pub cooldown_ms: u64,
}

impl SessionSettings {
    pub fn countdown(&self) -> Duration {
        Duration::from_secs(self.countdown_secs as u64)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            countdown_secs: 3,
            capture_timeout_ms: 2000,
            cooldown_ms: 5000,
        }
    }
}

/// Device I/O and retry policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Attempts per job for transient faults, including the first.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Upper bound on waiting for the device to accept one chunk.
    pub write_timeout_ms: u64,
    pub chunk_size: usize,
    /// Query real-time status (DLE EOT) before each job.
    pub status_query: bool,
}

impl TransportSettings {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff_ms: 250,
            max_backoff_ms: 2000,
            write_timeout_ms: 5000,
            chunk_size: 4096,
            status_query: true,
        }
    }
}

impl Settings {
    /// Parse settings from TOML text and validate them.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read, parse and validate a TOML settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        if self.printer.width_dots == 0 {
            return Err(invalid("printer.width_dots", "must be positive"));
        }
        if self.printer.band_rows() == 0 {
            return Err(invalid(
                "printer.max_band_bytes",
                format!("must hold at least one {}-byte row", self.printer.width_bytes()),
            ));
        }

        let e = &self.exposure;
        if !(e.min_gain > 0.0 && e.min_gain <= e.max_gain) {
            return Err(invalid("exposure.min_gain", "must satisfy 0 < min_gain <= max_gain"));
        }
        if !(e.target_low > 0.0 && e.target_low <= e.target_high && e.target_high <= 255.0) {
            return Err(invalid(
                "exposure.target_low",
                "must satisfy 0 < target_low <= target_high <= 255",
            ));
        }
        if e.manual_gain <= 0.0 {
            return Err(invalid("exposure.manual_gain", "must be positive"));
        }
        if let LuminanceStatistic::Percentile { percentile } = e.statistic
            && !(0.0..=100.0).contains(&percentile)
        {
            return Err(invalid("exposure.statistic.percentile", "must be within 0-100"));
        }

        if self.layout.max_height == 0 || self.layout.photo_max_height == 0 {
            return Err(invalid("layout.max_height", "heights must be positive"));
        }
        if self.qr.module_dots == 0 {
            return Err(invalid("qr.module_dots", "must be at least 1"));
        }

        let t = &self.transport;
        if t.max_attempts == 0 {
            return Err(invalid("transport.max_attempts", "must be at least 1"));
        }
        if t.chunk_size == 0 {
            return Err(invalid("transport.chunk_size", "must be positive"));
        }
        if t.initial_backoff_ms > t.max_backoff_ms {
            return Err(invalid(
                "transport.initial_backoff_ms",
                "must not exceed max_backoff_ms",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_partial_override() {
        let settings = Settings::from_toml_str(
            r#"
            [store]
            name = "Corner Bakery"

            [session]
            countdown_secs = 5

            [exposure]
            statistic = { kind = "percentile", percentile = 30.0 }

            [layout]
            dithering = "floyd-steinberg"
            "#,
        )
        .unwrap();

        assert_eq!(settings.store.name, "Corner Bakery");
        assert_eq!(settings.store.qr_url, "https://example.com");
        assert_eq!(settings.session.countdown_secs, 5);
        assert_eq!(
            settings.exposure.statistic,
            LuminanceStatistic::Percentile { percentile: 30.0 }
        );
        assert_eq!(settings.layout.dithering, DitheringAlgorithm::FloydSteinberg);
    }

    #[test]
    fn test_rejects_inverted_gain_bounds() {
        let err = Settings::from_toml_str("[exposure]\nmin_gain = 4.0\nmax_gain = 2.0\n")
            .unwrap_err();
        assert!(err.to_string().contains("exposure.min_gain"));
    }

    #[test]
    fn test_rejects_tiny_band_limit() {
        let mut settings = Settings::default();
        settings.printer.max_band_bytes = 10;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_toml() {
        assert!(matches!(
            Settings::from_toml_str("[session]\ncountdown_secs = \"three\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }
}
