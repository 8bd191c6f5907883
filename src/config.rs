use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WardcamConfig {
    pub camera: CameraConfig,
    pub detection: DetectionConfig,
    pub motion: MotionConfig,
    pub face: FaceConfig,
    pub recording: RecordingConfig,
    pub logging: LoggingConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CameraConfig {
    /// Camera device index (e.g., 0 for /dev/video0)
    #[serde(default = "default_camera_index")]
    pub index: u32,

    /// Requested capture resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Requested capture frame rate
    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// Pixel format delivered to the pipeline
    #[serde(default = "default_camera_format")]
    pub format: String,
}

/// Stage switches for the per-frame pipeline
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DetectionConfig {
    #[serde(default = "default_true")]
    pub face_enabled: bool,

    #[serde(default = "default_true")]
    pub motion_enabled: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MotionConfig {
    /// Minimum region area in pixels to report as motion
    #[serde(default = "default_min_area")]
    pub min_area: f64,

    /// Per-pixel difference cutoff on a 0-255 scale
    #[serde(default = "default_delta_threshold")]
    pub delta_threshold: u8,

    /// Gaussian kernel size used to smooth frames (odd, 1 disables blurring)
    #[serde(default = "default_blur_kernel_size")]
    pub blur_kernel_size: u32,

    /// 3x3 dilation passes applied to the difference mask
    #[serde(default = "default_dilate_iterations")]
    pub dilate_iterations: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FaceConfig {
    /// Path to the frontal-face Haar cascade model
    #[serde(default = "default_face_model_path")]
    pub model_path: PathBuf,

    #[serde(default = "default_face_scale_factor")]
    pub scale_factor: f64,

    #[serde(default = "default_face_min_neighbors")]
    pub min_neighbors: u32,

    /// Smallest detectable face (width, height)
    #[serde(default = "default_face_min_size")]
    pub min_size: (u32, u32),
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EncoderBackend {
    /// AVI/MJPG through GStreamer
    Gstreamer,
    /// Concatenated JPEG stream written directly
    Mjpeg,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RecordingConfig {
    /// Record clips while detections keep occurring
    #[serde(default)]
    pub enabled: bool,

    /// Seconds without detections before a clip is closed
    #[serde(default = "default_record_duration")]
    pub duration_seconds: u64,

    /// Nominal frame rate written into clips
    #[serde(default = "default_record_fps")]
    pub fps: u32,

    #[serde(default = "default_encoder_backend")]
    pub backend: EncoderBackend,

    /// Write a JSON sidecar describing each clip
    #[serde(default)]
    pub save_metadata: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Root directory for the event log and recordings
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default = "default_log_file")]
    pub log_file: String,

    /// IANA timezone for event timestamps; local time when unset
    #[serde(default)]
    pub timezone: Option<String>,

    /// Echo event records to stdout
    #[serde(default = "default_true")]
    pub echo_stdout: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DisplayBackend {
    Window,
    Framebuffer,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DisplayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_display_backend")]
    pub backend: DisplayBackend,

    #[serde(default = "default_window_title")]
    pub window_title: String,

    /// Framebuffer device path
    #[serde(default = "default_framebuffer_device")]
    pub framebuffer_device: String,

    /// Framebuffer resolution (width, height)
    #[serde(default = "default_display_resolution")]
    pub resolution: (u32, u32),

    /// Draw the capture time onto displayed frames
    #[serde(default)]
    pub timestamp_overlay: bool,

    /// Path to TrueType font file for timestamp overlay
    #[serde(default = "default_timestamp_font_path")]
    pub timestamp_font_path: String,

    #[serde(default = "default_timestamp_font_size")]
    pub timestamp_font_size: f32,
}

impl WardcamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("wardcam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let defaults = Self::default();

        let settings = Config::builder()
            .set_default("camera.index", defaults.camera.index)?
            .set_default(
                "camera.resolution",
                vec![defaults.camera.resolution.0, defaults.camera.resolution.1],
            )?
            .set_default("camera.fps", defaults.camera.fps)?
            .set_default("camera.format", defaults.camera.format.clone())?
            .set_default("detection.face_enabled", defaults.detection.face_enabled)?
            .set_default("detection.motion_enabled", defaults.detection.motion_enabled)?
            .set_default("motion.min_area", defaults.motion.min_area)?
            .set_default("motion.delta_threshold", defaults.motion.delta_threshold as u32)?
            .set_default("motion.blur_kernel_size", defaults.motion.blur_kernel_size)?
            .set_default("motion.dilate_iterations", defaults.motion.dilate_iterations as u32)?
            .set_default(
                "face.model_path",
                defaults.face.model_path.to_string_lossy().to_string(),
            )?
            .set_default("face.scale_factor", defaults.face.scale_factor)?
            .set_default("face.min_neighbors", defaults.face.min_neighbors)?
            .set_default(
                "face.min_size",
                vec![defaults.face.min_size.0, defaults.face.min_size.1],
            )?
            .set_default("recording.enabled", defaults.recording.enabled)?
            .set_default(
                "recording.duration_seconds",
                defaults.recording.duration_seconds as i64,
            )?
            .set_default("recording.fps", defaults.recording.fps)?
            .set_default("recording.backend", "mjpeg")?
            .set_default("recording.save_metadata", defaults.recording.save_metadata)?
            .set_default(
                "logging.log_dir",
                defaults.logging.log_dir.to_string_lossy().to_string(),
            )?
            .set_default("logging.log_file", defaults.logging.log_file.clone())?
            .set_default("logging.echo_stdout", defaults.logging.echo_stdout)?
            .set_default("display.enabled", defaults.display.enabled)?
            .set_default("display.backend", "window")?
            .set_default("display.window_title", defaults.display.window_title.clone())?
            .set_default(
                "display.framebuffer_device",
                defaults.display.framebuffer_device.clone(),
            )?
            .set_default(
                "display.resolution",
                vec![defaults.display.resolution.0, defaults.display.resolution.1],
            )?
            .set_default("display.timestamp_overlay", defaults.display.timestamp_overlay)?
            .set_default(
                "display.timestamp_font_path",
                defaults.display.timestamp_font_path.clone(),
            )?
            .set_default(
                "display.timestamp_font_size",
                defaults.display.timestamp_font_size as f64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // WARDCAM_RECORDING__ENABLED=true style overrides
            .add_source(
                Environment::with_prefix("WARDCAM")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: WardcamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if self.motion.min_area < 0.0 || !self.motion.min_area.is_finite() {
            return Err(ConfigError::Message(
                "Motion min_area must be a non-negative number".to_string(),
            ));
        }

        if self.motion.blur_kernel_size == 0 || self.motion.blur_kernel_size % 2 == 0 {
            return Err(ConfigError::Message(
                "Motion blur_kernel_size must be a positive odd number".to_string(),
            ));
        }

        if self.face.scale_factor <= 1.0 {
            return Err(ConfigError::Message(
                "Face scale_factor must be greater than 1.0".to_string(),
            ));
        }

        if self.face.min_neighbors == 0 {
            return Err(ConfigError::Message(
                "Face min_neighbors must be greater than 0".to_string(),
            ));
        }

        if self.recording.duration_seconds == 0 {
            return Err(ConfigError::Message(
                "Recording duration_seconds must be greater than 0".to_string(),
            ));
        }

        if self.recording.fps == 0 {
            return Err(ConfigError::Message(
                "Recording fps must be greater than 0".to_string(),
            ));
        }

        if self.logging.log_file.is_empty() {
            return Err(ConfigError::Message(
                "Logging log_file must not be empty".to_string(),
            ));
        }

        if let Some(tz) = &self.logging.timezone {
            if tz.parse::<chrono_tz::Tz>().is_err() {
                return Err(ConfigError::Message(format!(
                    "Unknown logging timezone '{}'",
                    tz
                )));
            }
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> crate::error::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl RecordingConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_seconds)
    }
}

impl LoggingConfig {
    pub fn log_path(&self) -> PathBuf {
        self.log_dir.join(&self.log_file)
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.log_dir.join("videos")
    }
}

impl Default for WardcamConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                index: default_camera_index(),
                resolution: default_camera_resolution(),
                fps: default_camera_fps(),
                format: default_camera_format(),
            },
            detection: DetectionConfig {
                face_enabled: true,
                motion_enabled: true,
            },
            motion: MotionConfig::default(),
            face: FaceConfig::default(),
            recording: RecordingConfig::default(),
            logging: LoggingConfig::default(),
            display: DisplayConfig {
                enabled: true,
                backend: default_display_backend(),
                window_title: default_window_title(),
                framebuffer_device: default_framebuffer_device(),
                resolution: default_display_resolution(),
                timestamp_overlay: false,
                timestamp_font_path: default_timestamp_font_path(),
                timestamp_font_size: default_timestamp_font_size(),
            },
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            min_area: default_min_area(),
            delta_threshold: default_delta_threshold(),
            blur_kernel_size: default_blur_kernel_size(),
            dilate_iterations: default_dilate_iterations(),
        }
    }
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            model_path: default_face_model_path(),
            scale_factor: default_face_scale_factor(),
            min_neighbors: default_face_min_neighbors(),
            min_size: default_face_min_size(),
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            duration_seconds: default_record_duration(),
            fps: default_record_fps(),
            backend: default_encoder_backend(),
            save_metadata: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            log_file: default_log_file(),
            timezone: None,
            echo_stdout: true,
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_camera_index() -> u32 {
    0
}
fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_camera_fps() -> u32 {
    30
}
fn default_camera_format() -> String {
    "RGB".to_string()
}

fn default_min_area() -> f64 {
    500.0
}
fn default_delta_threshold() -> u8 {
    25
}
fn default_blur_kernel_size() -> u32 {
    21
}
fn default_dilate_iterations() -> u8 {
    2
}

fn default_face_model_path() -> PathBuf {
    PathBuf::from("/usr/share/opencv4/haarcascades/haarcascade_frontalface_default.xml")
}
fn default_face_scale_factor() -> f64 {
    1.1
}
fn default_face_min_neighbors() -> u32 {
    5
}
fn default_face_min_size() -> (u32, u32) {
    (30, 30)
}

fn default_record_duration() -> u64 {
    10
}
fn default_record_fps() -> u32 {
    20
}
fn default_encoder_backend() -> EncoderBackend {
    EncoderBackend::Mjpeg
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("security_logs")
}
fn default_log_file() -> String {
    "security_log.txt".to_string()
}

fn default_display_backend() -> DisplayBackend {
    DisplayBackend::Window
}
fn default_window_title() -> String {
    "Wardcam Security Feed".to_string()
}
fn default_framebuffer_device() -> String {
    "/dev/fb0".to_string()
}
fn default_display_resolution() -> (u32, u32) {
    (800, 480)
}
fn default_timestamp_font_path() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string()
}
fn default_timestamp_font_size() -> f32 {
    20.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = WardcamConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.detection.face_enabled);
        assert!(config.detection.motion_enabled);
        assert_eq!(config.motion.min_area, 500.0);
        assert!(!config.recording.enabled);
        assert_eq!(config.recording.duration(), Duration::from_secs(10));
        assert_eq!(config.recording.fps, 20);
        assert_eq!(
            config.logging.log_path(),
            PathBuf::from("security_logs/security_log.txt")
        );
    }

    #[test]
    fn test_config_validation() {
        let mut config = WardcamConfig::default();

        config.camera.resolution = (0, 0);
        assert!(config.validate().is_err());
        config.camera.resolution = (640, 480);
        assert!(config.validate().is_ok());

        config.motion.blur_kernel_size = 20;
        assert!(config.validate().is_err());
        config.motion.blur_kernel_size = 21;

        config.recording.duration_seconds = 0;
        assert!(config.validate().is_err());
        config.recording.duration_seconds = 10;

        config.face.scale_factor = 1.0;
        assert!(config.validate().is_err());
        config.face.scale_factor = 1.1;

        config.logging.timezone = Some("Not/AZone".to_string());
        assert!(config.validate().is_err());
        config.logging.timezone = Some("Europe/Berlin".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wardcam.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[detection]
face_enabled = false

[motion]
min_area = 750.0

[recording]
enabled = true
duration_seconds = 4
backend = "gstreamer"
"#
        )
        .unwrap();

        let config = WardcamConfig::load_from_file(&path).unwrap();
        assert!(!config.detection.face_enabled);
        assert!(config.detection.motion_enabled);
        assert_eq!(config.motion.min_area, 750.0);
        assert_eq!(config.motion.delta_threshold, 25);
        assert!(config.recording.enabled);
        assert_eq!(config.recording.duration_seconds, 4);
        assert_eq!(config.recording.backend, EncoderBackend::Gstreamer);
        assert_eq!(config.camera.resolution, (640, 480));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = WardcamConfig::load_from_file(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, WardcamConfig::default());
    }

    #[test]
    fn test_default_config_renders_as_toml() {
        let rendered = WardcamConfig::default().to_toml().unwrap();
        assert!(rendered.contains("[recording]"));
        assert!(rendered.contains("min_area = 500.0"));
    }
}
