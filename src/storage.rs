use crate::config::{DriveSettings, OutputSettings};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::session::{PageRecord, PageSink};
use reqwest::blocking::multipart;
use reqwest::blocking::Client;
use std::fs;
use std::path::{Path, PathBuf};

const DRIVE_UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/drive/v3/files?uploadType=multipart";
const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";

/// Replace characters that cannot appear in file names
///
/// Runs of replacements collapse to a single underscore and an empty result
/// falls back to a placeholder, so every book title maps to a usable
/// directory name.
pub fn sanitize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        let c = if matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') {
            '_'
        } else {
            c
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "unknown_book".to_string()
    } else {
        trimmed.to_string()
    }
}

/// On-disk layout for one book: page images, extracted text and summary
#[derive(Debug, Clone)]
pub struct BookPaths {
    pub root: PathBuf,
    pub screenshots_dir: PathBuf,
    pub text_path: PathBuf,
    pub summary_path: PathBuf,
}

impl BookPaths {
    pub fn new(settings: &OutputSettings, title: &str) -> Self {
        let root = PathBuf::from(&settings.dir).join(sanitize_title(title));
        Self {
            screenshots_dir: root.join(&settings.screenshots_dir),
            text_path: root.join(&settings.text_file),
            summary_path: root.join(&settings.summary_file),
            root,
        }
    }

    pub fn create_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.screenshots_dir)?;
        Ok(())
    }
}

/// Page sink that writes zero-padded PNG files into one directory
pub struct DirSink {
    dir: PathBuf,
}

impl DirSink {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn page_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("page_{:04}.png", index))
    }
}

impl PageSink for DirSink {
    fn store(&mut self, index: usize, frame: &Frame) -> Result<PathBuf> {
        let path = self.page_path(index);
        frame.save_png(&path)?;
        log::info!("saved {}", path.display());
        Ok(path)
    }
}

/// Minimal Google Drive client for uploading captured artifacts
///
/// Only the two calls the pipeline needs: create a folder and upload a
/// file. Token acquisition and refresh are out of scope; a short-lived
/// OAuth access token comes from config or the environment.
pub struct DriveClient {
    client: Client,
    token: String,
    folder_id: Option<String>,
}

impl DriveClient {
    /// Build a client if an access token is configured
    pub fn from_settings(settings: &DriveSettings) -> Option<Self> {
        let token = settings.access_token.clone()?;
        Some(Self {
            client: Client::new(),
            token,
            folder_id: settings.folder_id.clone(),
        })
    }

    /// Create a folder for this book, under the configured parent if any
    pub fn create_folder(&self, name: &str) -> Result<String> {
        let mut metadata = serde_json::json!({
            "name": name,
            "mimeType": "application/vnd.google-apps.folder",
        });
        if let Some(parent) = &self.folder_id {
            metadata["parents"] = serde_json::json!([parent]);
        }

        let response = self
            .client
            .post(DRIVE_FILES_URL)
            .bearer_auth(&self.token)
            .json(&metadata)
            .send()?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::DriveApiError(format!(
                "folder creation failed ({}): {}",
                status, error_text
            )));
        }

        let json: serde_json::Value = response.json()?;
        json.get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| Error::DriveApiError("no id in folder response".to_string()))
    }

    /// Upload one file, returning its Drive file id
    pub fn upload_file(&self, path: &Path, name: &str, parent: Option<&str>) -> Result<String> {
        let mut metadata = serde_json::json!({ "name": name });
        let parent = parent.or(self.folder_id.as_deref());
        if let Some(parent) = parent {
            metadata["parents"] = serde_json::json!([parent]);
        }

        let mime = if name.ends_with(".png") {
            "image/png"
        } else {
            "text/plain"
        };

        let metadata_part = multipart::Part::text(metadata.to_string())
            .mime_str("application/json")
            .map_err(|e| Error::DriveApiError(format!("bad metadata part: {}", e)))?;
        let file_part = multipart::Part::bytes(fs::read(path)?)
            .file_name(name.to_string())
            .mime_str(mime)
            .map_err(|e| Error::DriveApiError(format!("bad file part: {}", e)))?;

        let form = multipart::Form::new()
            .part("metadata", metadata_part)
            .part("file", file_part);

        let response = self
            .client
            .post(DRIVE_UPLOAD_URL)
            .bearer_auth(&self.token)
            .multipart(form)
            .send()?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::DriveApiError(format!(
                "upload of {} failed ({}): {}",
                name, status, error_text
            )));
        }

        let json: serde_json::Value = response.json()?;
        json.get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| Error::DriveApiError("no id in upload response".to_string()))
    }

    /// Upload every persisted page, returning how many made it
    ///
    /// Individual failures are logged and skipped; the local copies remain
    /// the source of truth.
    pub fn upload_pages(&self, pages: &[PageRecord], parent: Option<&str>) -> usize {
        let mut uploaded = 0;
        for page in pages {
            let Some(path) = &page.path else { continue };
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| format!("page_{:04}.png", page.index));
            match self.upload_file(path, &name, parent) {
                Ok(id) => {
                    log::debug!("uploaded {} (id: {})", name, id);
                    uploaded += 1;
                }
                Err(e) => log::warn!("upload of {} failed: {}", name, e),
            }
        }
        log::info!("uploaded {}/{} pages to Drive", uploaded, pages.len());
        uploaded
    }
}
