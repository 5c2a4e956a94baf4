//! Image items returned by image-capable chat models.
//!
//! Providers behind OpenRouter disagree on how an image is encoded inside
//! `choices[0].message.images`, so each item is parsed into one of a closed
//! set of known shapes before being flattened into a list of URLs.

use base64::Engine as _;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Known encodings of a single returned image. Variants are tried in
/// declaration order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ImagePart {
    /// `{"type": "image_url", "image_url": {"url": "data:..."}}`
    Nested { image_url: ImageUrl },
    /// `"https://..."`
    Bare(String),
    /// `{"url": "https://..."}`
    Direct { url: String },
    Unrecognized(Value),
}

impl ImagePart {
    pub fn url(&self) -> Option<&str> {
        match self {
            ImagePart::Nested { image_url } => Some(&image_url.url),
            ImagePart::Bare(url) => Some(url),
            ImagePart::Direct { url } => Some(url),
            ImagePart::Unrecognized(_) => None,
        }
    }
}

/// Flatten the raw `images` field into URLs, keeping the original order.
///
/// A missing or non-array field yields no images. Items in an unknown shape
/// are dropped with a warning.
pub fn normalize_images(images: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = images else {
        return Vec::new();
    };

    let mut urls = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        // ImagePart ends in a catch-all variant, so this cannot fail.
        let part = ImagePart::deserialize(item).unwrap_or(ImagePart::Unrecognized(Value::Null));
        match part.url() {
            Some(url) => urls.push(url.to_string()),
            None => warn!(index, item = %item, "dropping image in unrecognized shape"),
        }
    }
    urls
}

/// Decoded `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Decode a base64 `data:<mime>;base64,<payload>` URL. Anything else,
/// including remote URLs and non-base64 data URLs, yields `None`.
pub fn decode_data_url(url: &str) -> Option<DataUrl> {
    let rest = url.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime_type = meta.strip_suffix(";base64")?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .ok()?;
    let mime_type = if mime_type.is_empty() {
        "application/octet-stream"
    } else {
        mime_type
    };
    Some(DataUrl {
        mime_type: mime_type.to_string(),
        bytes,
    })
}

pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        _ => "png",
    }
}

/// Short form of a URL for log lines; data URLs can be megabytes long.
pub fn preview_url(url: &str) -> String {
    const PREVIEW_CHARS: usize = 50;
    if url.chars().count() <= PREVIEW_CHARS {
        url.to_string()
    } else {
        let head: String = url.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    }
}
