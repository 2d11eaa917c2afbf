use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use eframe::egui::ColorImage;

use crate::error::{LabError, LabResult};

/// MIME type of every image produced by the generative service.
pub const RESULT_MIME_TYPE: &str = "image/png";

const DEFAULT_DOWNLOAD_STEM: &str = "download";

/// An uploaded image, read fully into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub name: String,
    pub path: Option<PathBuf>,
    pub mime_type: String,
    pub bytes: Arc<[u8]>,
}

impl SourceImage {
    pub fn load(path: &Path) -> LabResult<Self> {
        let mime_type = mime_type_for_path(path).ok_or_else(|| {
            LabError::Encoding(format!(
                "Unsupported image type for {}",
                path.display()
            ))
        })?;
        let bytes = fs::read(path).map_err(|err| {
            LabError::Encoding(format!("Could not read {}: {err}", path.display()))
        })?;
        if bytes.is_empty() {
            return Err(LabError::Encoding(format!("{} is empty", path.display())));
        }

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            path: Some(path.to_path_buf()),
            ..Self::from_bytes(&name, mime_type, bytes)
        })
    }

    pub fn from_bytes(name: &str, mime_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            path: None,
            mime_type: mime_type.to_string(),
            bytes: Arc::from(bytes),
        }
    }
}

pub fn mime_type_for_path(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

pub fn encode_base64(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

pub fn decode_base64(text: &str) -> LabResult<Vec<u8>> {
    general_purpose::STANDARD
        .decode(text.trim())
        .map_err(|err| LabError::Encoding(format!("Invalid base64 payload: {err}")))
}

pub fn to_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", encode_base64(bytes))
}

pub fn parse_data_uri(uri: &str) -> LabResult<(String, Vec<u8>)> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| LabError::Encoding("Not a data URI".to_string()))?;
    let Some((header, payload)) = rest.split_once(',') else {
        return Err(LabError::Encoding("Data URI has no payload".to_string()));
    };
    let Some(mime_type) = header.strip_suffix(";base64") else {
        return Err(LabError::Encoding(
            "Only base64 data URIs are supported".to_string(),
        ));
    };
    Ok((mime_type.to_string(), decode_base64(payload)?))
}

/// File name for saving an image, derived from its alt text.
pub fn download_file_name(alt: &str) -> String {
    let stem = alt
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect::<String>();
    if stem.is_empty() {
        format!("{DEFAULT_DOWNLOAD_STEM}.png")
    } else {
        format!("{stem}.png")
    }
}

pub fn decode_for_display(bytes: &[u8]) -> LabResult<ColorImage> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|err| LabError::Encoding(format!("Could not decode image: {err}")))?;
    let rgba = decoded.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    Ok(ColorImage::from_rgba_unmultiplied(size, rgba.as_raw()))
}
