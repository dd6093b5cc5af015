pub mod exif;

use crate::error::{FieldLogError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use fieldlog_common::PhotoRef;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub use self::exif::{extract_location, read_location, PhotoLocation};

#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub path: PathBuf,
    pub file_name: String,
}

impl ImageInfo {
    /// ファイルパスによる参照
    pub fn photo_ref(&self) -> PhotoRef {
        PhotoRef(self.path.display().to_string())
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "heic", "webp"];

pub fn scan_folder(folder: &Path) -> Result<Vec<ImageInfo>> {
    if !folder.is_dir() {
        return Err(FieldLogError::FolderNotFound(folder.display().to_string()));
    }

    let mut images = Vec::new();

    for entry in WalkDir::new(folder)
        .max_depth(1)  // 直下のみ（再帰しない）
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() || mime_type(path).is_none() {
            continue;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        images.push(ImageInfo {
            path: path.to_path_buf(),
            file_name,
        });
    }

    // ファイル名でソート
    images.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    Ok(images)
}

/// 拡張子からMIMEタイプ（画像以外は None）
fn mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
    if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    Some(match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "tif" | "tiff" => "image/tiff",
        "heic" => "image/heic",
        _ => "image/webp",
    })
}

/// 写真を data URL として読み込む（住所レコードへの添付用）
pub fn read_data_url(path: &Path) -> Result<PhotoRef> {
    if !path.is_file() {
        return Err(FieldLogError::FileNotFound(path.display().to_string()));
    }
    let mime = mime_type(path).unwrap_or("application/octet-stream");
    let bytes = std::fs::read(path)?;
    Ok(PhotoRef(format!("data:{};base64,{}", mime, STANDARD.encode(bytes))))
}
