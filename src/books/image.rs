use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;

/// Decoded upload: raw bytes plus the MIME type to store alongside them.
pub struct ImagePayload {
    pub content_type: String,
    pub bytes: Bytes,
}

fn mime_allowed(content_type: &str) -> bool {
    matches!(
        content_type,
        "image/jpeg" | "image/jpg" | "image/png" | "image/webp" | "image/heic"
    )
}

/// Parses an embeddable `data:<mime>;base64,<payload>` image.
pub fn parse_data_uri(input: &str) -> Result<ImagePayload, &'static str> {
    let rest = input
        .strip_prefix("data:")
        .ok_or("Image must be a base64 data URI")?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or("Image data URI is malformed")?;
    let content_type = meta
        .strip_suffix(";base64")
        .ok_or("Image data URI must be base64 encoded")?;
    if !mime_allowed(content_type) {
        return Err("Unsupported image type");
    }

    let bytes = BASE64
        .decode(payload)
        .map_err(|_| "Image payload is not valid base64")?;
    if bytes.is_empty() {
        return Err("Image payload is empty");
    }

    Ok(ImagePayload {
        content_type: content_type.to_string(),
        bytes: Bytes::from(bytes),
    })
}
