//! Content-level image verification.
//!
//! The format is taken from the bytes themselves (magic numbers / container
//! structure). The declared `Content-Type` and the URL extension are advisory
//! and never decide the outcome.

use std::fmt;
use std::io::Cursor;

use serde::{Deserialize, Serialize};

use crate::config::GateConfig;

/// Formats the gate knows how to verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectedFormat {
    Avif,
    Gif,
    Jpeg,
    Png,
    Webp,
}

impl DetectedFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            DetectedFormat::Avif => "avif",
            DetectedFormat::Gif => "gif",
            DetectedFormat::Jpeg => "jpeg",
            DetectedFormat::Png => "png",
            DetectedFormat::Webp => "webp",
        }
    }

    /// File extension used for stored assets.
    pub fn extension(self) -> &'static str {
        match self {
            DetectedFormat::Jpeg => "jpg",
            other => other.as_str(),
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            DetectedFormat::Avif => "image/avif",
            DetectedFormat::Gif => "image/gif",
            DetectedFormat::Jpeg => "image/jpeg",
            DetectedFormat::Png => "image/png",
            DetectedFormat::Webp => "image/webp",
        }
    }
}

impl fmt::Display for DetectedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImageCheckError {
    #[error("not a valid image: {0}")]
    Invalid(String),
    #[error("unsupported format: {detected}; allowed: {allowed}")]
    Unsupported { detected: String, allowed: String },
}

/// Detects the format of `bytes`, checks it against `cfg.allowed_formats`,
/// and fully decodes the payload.
pub fn verify_image(bytes: &[u8], cfg: &GateConfig) -> Result<DetectedFormat, ImageCheckError> {
    let format = match detect(bytes)? {
        Detected::Known(f) => f,
        Detected::Other(name) => {
            return Err(ImageCheckError::Unsupported {
                detected: name,
                allowed: cfg.allowed_formats_list(),
            })
        }
    };

    if !cfg.format_allowed(format.as_str()) {
        return Err(ImageCheckError::Unsupported {
            detected: format.as_str().to_string(),
            allowed: cfg.allowed_formats_list(),
        });
    }

    decode(bytes, format, cfg.max_decode_bytes)?;
    Ok(format)
}

enum Detected {
    Known(DetectedFormat),
    /// Recognised image signature outside the verifiable set (bmp, tiff, ...).
    Other(String),
}

fn detect(bytes: &[u8]) -> Result<Detected, ImageCheckError> {
    if avif_brand(bytes).is_some() {
        return Ok(Detected::Known(DetectedFormat::Avif));
    }
    let guessed = image::guess_format(bytes)
        .map_err(|e| ImageCheckError::Invalid(format!("unrecognised signature ({e})")))?;
    Ok(match guessed {
        image::ImageFormat::Png => Detected::Known(DetectedFormat::Png),
        image::ImageFormat::Jpeg => Detected::Known(DetectedFormat::Jpeg),
        image::ImageFormat::Gif => Detected::Known(DetectedFormat::Gif),
        image::ImageFormat::WebP => Detected::Known(DetectedFormat::Webp),
        image::ImageFormat::Avif => Detected::Known(DetectedFormat::Avif),
        other => Detected::Other(format!("{other:?}").to_ascii_lowercase()),
    })
}

fn decode(bytes: &[u8], format: DetectedFormat, max_alloc: u64) -> Result<(), ImageCheckError> {
    let codec = match format {
        DetectedFormat::Avif => return check_avif_container(bytes),
        DetectedFormat::Gif => image::ImageFormat::Gif,
        DetectedFormat::Jpeg => image::ImageFormat::Jpeg,
        DetectedFormat::Png => image::ImageFormat::Png,
        DetectedFormat::Webp => image::ImageFormat::WebP,
    };
    let mut limits = image::Limits::default();
    limits.max_alloc = Some(max_alloc);
    let mut reader = image::ImageReader::with_format(Cursor::new(bytes), codec);
    reader.limits(limits);
    let img = reader
        .decode()
        .map_err(|e| ImageCheckError::Invalid(e.to_string()))?;
    if img.width() == 0 || img.height() == 0 {
        return Err(ImageCheckError::Invalid("zero-sized image".to_string()));
    }
    Ok(())
}

/// Returns the AVIF brand if `bytes` starts with an ISOBMFF `ftyp` box that
/// declares `avif` or `avis` as its major or a compatible brand.
fn avif_brand(bytes: &[u8]) -> Option<&[u8]> {
    let header = bytes.get(..8)?;
    if &header[4..8] != b"ftyp" {
        return None;
    }
    let size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    if size < 16 || size > bytes.len() || size % 4 != 0 {
        return None;
    }
    let major = &bytes[8..12];
    std::iter::once(major)
        .chain(bytes[16..size].chunks_exact(4))
        .find(|brand| *brand == b"avif" || *brand == b"avis")
}

/// Structural check of an AVIF container: after `ftyp`, a sequence of
/// well-formed boxes that includes the `meta` box carrying the image items.
/// No AV1 decoder is compiled in, so this is the deepest check performed.
fn check_avif_container(bytes: &[u8]) -> Result<(), ImageCheckError> {
    let malformed = || ImageCheckError::Invalid("malformed AVIF box".to_string());
    let mut offset = 0usize;
    let mut saw_meta = false;
    while offset < bytes.len() {
        let remaining = (bytes.len() - offset) as u64;
        let header = bytes
            .get(offset..offset + 8)
            .ok_or_else(|| ImageCheckError::Invalid("truncated AVIF box header".to_string()))?;
        let size32 = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let kind = &header[4..8];
        let (size, header_len) = match size32 {
            0 => (remaining, 8),
            1 => {
                let ext = bytes.get(offset + 8..offset + 16).ok_or_else(|| {
                    ImageCheckError::Invalid("truncated AVIF large box".to_string())
                })?;
                let large = u64::from_be_bytes([
                    ext[0], ext[1], ext[2], ext[3], ext[4], ext[5], ext[6], ext[7],
                ]);
                (large, 16)
            }
            n => (n, 8),
        };
        // Size is untrusted: it must cover its own header and stay inside the payload.
        if size < header_len || size > remaining {
            return Err(malformed());
        }
        if kind == b"meta" {
            saw_meta = true;
        }
        let next = usize::try_from(size)
            .ok()
            .and_then(|n| offset.checked_add(n))
            .ok_or_else(malformed)?;
        if next <= offset {
            return Err(malformed());
        }
        offset = next;
    }
    if !saw_meta {
        return Err(ImageCheckError::Invalid("AVIF without meta box".to_string()));
    }
    Ok(())
}
