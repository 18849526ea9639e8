//! Image codec
//!
//! Images travel through the service as self-describing data URIs
//! (`data:<mime>;base64,<payload>`). The same string is what the session
//! stores, what the generation backends consume and produce, and what API
//! clients render directly.

use std::fmt;
use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PNG_MIME: &str = "image/png";

/// Codec errors
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Unsupported image: {0}")]
    Image(#[from] image::ImageError),
}

/// Opaque, directly renderable image representation
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageData {
    uri: String,
    /// Byte offset of the base64 payload inside `uri`
    payload_start: usize,
}

impl ImageData {
    /// Encode raw bytes as a data URI. Never fails.
    pub fn encode(bytes: &[u8], mime_type: &str) -> Self {
        let mime = mime_type.trim();
        let mime = if mime.is_empty() { "application/octet-stream" } else { mime };
        let prefix = format!("data:{};base64,", mime);
        let payload_start = prefix.len();
        let mut uri = prefix;
        STANDARD.encode_string(bytes, &mut uri);
        ImageData { uri, payload_start }
    }

    /// Parse and validate a data URI received from outside the service
    pub fn parse(uri: &str) -> Result<Self, CodecError> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| CodecError::InvalidDataUri("missing 'data:' scheme".to_string()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| CodecError::InvalidDataUri("missing ',' separator".to_string()))?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| CodecError::InvalidDataUri("only base64 data URIs are supported".to_string()))?;
        if mime.is_empty() || !mime.contains('/') {
            return Err(CodecError::InvalidDataUri(format!("bad mime type '{}'", mime)));
        }
        if payload.is_empty() {
            return Err(CodecError::InvalidDataUri("empty payload".to_string()));
        }
        STANDARD.decode(payload)?;

        Ok(ImageData {
            uri: uri.to_string(),
            payload_start: uri.len() - payload.len(),
        })
    }

    /// The representation is already renderable, so this is the identity
    #[cfg(test)]
    pub fn as_displayable(&self) -> &str {
        &self.uri
    }

    pub fn mime_type(&self) -> &str {
        let header = &self.uri["data:".len()..self.payload_start - 1];
        header.strip_suffix(";base64").unwrap_or(header)
    }

    pub fn base64_payload(&self) -> &str {
        &self.uri[self.payload_start..]
    }

    /// Decode back to raw bytes
    pub fn decode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(STANDARD.decode(self.base64_payload())?)
    }

    /// Raw PNG bytes, transcoding when the image is stored in another format
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let bytes = self.decode()?;
        if self.mime_type() == PNG_MIME {
            return Ok(bytes);
        }

        let decoded = image::load_from_memory(&bytes)?;
        let mut out = Cursor::new(Vec::new());
        decoded.write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }

    pub fn len(&self) -> usize {
        self.uri.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uri.len() == self.payload_start
    }
}

/// Detect the mime type of raw image bytes from their magic number
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::Bmp => Some("image/bmp"),
        _ => None,
    }
}

/// `image/<subtype>` where the subtype is a bare RFC 6838 token. Anything
/// else would not survive the `data:<mime>;base64,` framing.
fn is_image_mime(mime: &str) -> bool {
    mime.strip_prefix("image/").is_some_and(|subtype| {
        !subtype.is_empty()
            && subtype
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b"!#$&^_.+-".contains(&b))
    })
}

/// Pick the mime type for an upload: a well-formed declared `image/*` type
/// wins, otherwise fall back to sniffing the bytes.
pub fn resolve_mime(declared: Option<&str>, bytes: &[u8]) -> Option<String> {
    let declared = declared
        .map(|m| m.split(';').next().unwrap_or(m).trim().to_ascii_lowercase())
        .filter(|m| is_image_mime(m));

    declared.or_else(|| sniff_mime(bytes).map(str::to_string))
}

impl TryFrom<String> for ImageData {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ImageData::parse(&value)
    }
}

impl From<ImageData> for String {
    fn from(value: ImageData) -> Self {
        value.uri
    }
}

impl fmt::Debug for ImageData {
    // Payloads are large; never dump them into logs
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("mime_type", &self.mime_type())
            .field("len", &self.uri.len())
            .finish()
    }
}
