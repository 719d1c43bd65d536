use crate::models::AssetCategory;
use std::path::Path;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Assets are immutable once uploaded, so every object gets a one-year cache.
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "svg"];
const VIDEO_EXTENSIONS: [&str; 2] = ["mp4", "webm"];

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Category for a supported asset, `None` for anything outside the allow-list.
pub fn category_for(path: &Path) -> Option<AssetCategory> {
    let ext = extension(path)?;
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(AssetCategory::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(AssetCategory::Video)
    } else {
        None
    }
}

pub fn is_supported(path: &Path) -> bool {
    category_for(path).is_some()
}

/// Detects MIME content type from a file path extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match extension(path).as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

pub fn cache_control() -> &'static str {
    IMMUTABLE_CACHE_CONTROL
}
