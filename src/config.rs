use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main configuration for readerctl
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub reader: ReaderSettings,
    #[serde(default)]
    pub capture: CaptureSettings,
    #[serde(default)]
    pub compare: CompareSettings,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub ocr: OcrSettings,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub drive: DriveSettings,
}

/// Reader application settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReaderSettings {
    /// Window title substring used to find and focus the reader
    #[serde(default = "default_window_title")]
    pub window_title: String,
    /// Seconds to wait after focusing the reader window
    #[serde(default = "default_focus_delay")]
    pub focus_delay_secs: f64,
}

fn default_window_title() -> String {
    "Kindle".to_string()
}

fn default_focus_delay() -> f64 {
    1.5
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            window_title: default_window_title(),
            focus_delay_secs: default_focus_delay(),
        }
    }
}

/// Timing and termination settings for the capture loop
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptureSettings {
    /// Seconds to wait after a page-turn key press before capturing
    #[serde(default = "default_page_turn_delay")]
    pub page_turn_delay_secs: f64,
    /// Seconds to wait between successfully captured pages
    #[serde(default = "default_screenshot_delay")]
    pub screenshot_delay_secs: f64,
    /// Seconds to wait before re-attempting a failed page turn
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: f64,
    /// Page-turn attempts per page before assuming the book has ended
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,
    /// Hard upper bound on captured pages, independent of any budget
    #[serde(default = "default_safety_ceiling")]
    pub safety_ceiling: usize,
    /// Pages at the start of a book exempt from total/ceiling checks
    #[serde(default = "default_early_page_exemption")]
    pub early_page_exemption: usize,
}

fn default_page_turn_delay() -> f64 {
    4.0
}

fn default_screenshot_delay() -> f64 {
    1.0
}

fn default_retry_delay() -> f64 {
    1.0
}

fn default_retry_limit() -> u32 {
    3
}

fn default_safety_ceiling() -> usize {
    500
}

fn default_early_page_exemption() -> usize {
    10
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            page_turn_delay_secs: default_page_turn_delay(),
            screenshot_delay_secs: default_screenshot_delay(),
            retry_delay_secs: default_retry_delay(),
            retry_limit: default_retry_limit(),
            safety_ceiling: default_safety_ceiling(),
            early_page_exemption: default_early_page_exemption(),
        }
    }
}

/// Thresholds for the page comparison heuristic
///
/// These are empirically tuned values, not proven constants. Raise
/// `pixel_delta` or lower `same_page_threshold` if rendering jitter on your
/// reader causes identical pages to classify as different.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompareSettings {
    /// Side length both frames are downsampled to before comparison
    #[serde(default = "default_downsample_size")]
    pub downsample_size: u32,
    /// Side length of the centered sub-region actually compared
    #[serde(default = "default_center_size")]
    pub center_size: u32,
    /// Per-pixel luminance delta (0-255) above which a pixel counts as changed
    #[serde(default = "default_pixel_delta")]
    pub pixel_delta: u8,
    /// Similarity above which two frames are considered the same page
    #[serde(default = "default_same_page_threshold")]
    pub same_page_threshold: f64,
}

fn default_downsample_size() -> u32 {
    200
}

fn default_center_size() -> u32 {
    100
}

fn default_pixel_delta() -> u8 {
    15
}

fn default_same_page_threshold() -> f64 {
    0.90
}

impl Default for CompareSettings {
    fn default() -> Self {
        Self {
            downsample_size: default_downsample_size(),
            center_size: default_center_size(),
            pixel_delta: default_pixel_delta(),
            same_page_threshold: default_same_page_threshold(),
        }
    }
}

/// Output directory layout
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputSettings {
    #[serde(default = "default_output_dir")]
    pub dir: String,
    #[serde(default = "default_screenshots_dir")]
    pub screenshots_dir: String,
    #[serde(default = "default_text_file")]
    pub text_file: String,
    #[serde(default = "default_summary_file")]
    pub summary_file: String,
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_screenshots_dir() -> String {
    "screenshots".to_string()
}

fn default_text_file() -> String {
    "extracted_text.txt".to_string()
}

fn default_summary_file() -> String {
    "summary.txt".to_string()
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            screenshots_dir: default_screenshots_dir(),
            text_file: default_text_file(),
            summary_file: default_summary_file(),
        }
    }
}

/// OCR (tesseract) settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OcrSettings {
    /// Path to the tesseract binary
    #[serde(default = "default_tesseract_path")]
    pub tesseract_path: String,
    /// Tesseract language code
    #[serde(default = "default_ocr_language")]
    pub language: String,
}

fn default_tesseract_path() -> String {
    "tesseract".to_string()
}

fn default_ocr_language() -> String {
    "jpn".to_string()
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            tesseract_path: default_tesseract_path(),
            language: default_ocr_language(),
        }
    }
}

/// LLM backend configuration for summarization
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmSettings {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Character budget for summarization input; longer text is truncated
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_max_input_chars() -> usize {
    4000
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key: None,
            max_input_chars: default_max_input_chars(),
        }
    }
}

/// Google Drive upload settings
///
/// Token acquisition is out of scope; an OAuth access token with
/// `drive.file` scope is expected in the config or environment.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DriveSettings {
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".config/readerctl/config.toml")
    }

    /// Load config from file, returning defaults if file doesn't exist
    ///
    /// Secrets can be supplied or overridden with `READERCTL_API_KEY`,
    /// `READERCTL_DRIVE_TOKEN` and `READERCTL_DRIVE_FOLDER`.
    pub fn load() -> Self {
        let path = Self::path();
        let mut config = Self::default();
        if path.exists() {
            match fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(parsed) => config = parsed,
                    Err(e) => eprintln!("Warning: Failed to parse config: {}", e),
                },
                Err(e) => eprintln!("Warning: Failed to read config: {}", e),
            }
        }
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("READERCTL_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Ok(token) = std::env::var("READERCTL_DRIVE_TOKEN") {
            self.drive.access_token = Some(token);
        }
        if let Ok(folder) = std::env::var("READERCTL_DRIVE_FOLDER") {
            self.drive.folder_id = Some(folder);
        }
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::path();

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        fs::write(path, contents)
    }
}
