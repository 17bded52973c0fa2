//! Image payload helpers: base64 encoding and MIME sniffing.

use base64::{engine::general_purpose::STANDARD, Engine};

/// MIME type used when an upload declares none and cannot be sniffed.
pub const FALLBACK_MIME_TYPE: &str = "image/png";

/// Encode raw image bytes as standard base64.
pub fn encode_image(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Detect an image MIME type from its leading magic bytes.
pub fn detect_mime_type(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some("image/png"),
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some("image/gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        [b'B', b'M', ..] => Some("image/bmp"),
        [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => Some("image/tiff"),
        _ => None,
    }
}

/// Pick the MIME type for an upload: a declared `image/*` type wins, then
/// sniffing, then [`FALLBACK_MIME_TYPE`].
pub fn resolve_mime_type(declared: Option<&str>, bytes: &[u8]) -> String {
    if let Some(declared) = declared.map(str::trim) {
        if declared.starts_with("image/") {
            return declared.to_string();
        }
    }
    detect_mime_type(bytes)
        .unwrap_or(FALLBACK_MIME_TYPE)
        .to_string()
}
