//! Title and filename derivation for ingested images.
//!
//! The title comes from the URL's last path segment (query dropped,
//! extension stripped). Stored files never reuse the remote name: they get a
//! random identifier plus the extension of the format detected in the bytes.

use crate::image_check::DetectedFormat;

/// Linux NAME_MAX.
const NAME_MAX: usize = 255;

/// Extracts the last path segment from a URL.
///
/// Returns `None` if the URL cannot be parsed or the path is empty/root.
pub fn last_path_segment(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path().split('/').filter(|s| !s.is_empty()).last()?;
    if segment == "." || segment == ".." {
        return None;
    }
    Some(segment.to_string())
}

/// Strips one trailing extension: `cat.png` → `cat`, `a.tar.gz` → `a.tar`.
/// Dotfiles keep their name (`.hidden` → `.hidden`).
fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

/// Random identifier with the detected format's extension, e.g. `3f2a...c9.png`.
pub fn random_filename(format: DetectedFormat) -> String {
    format!("{}.{}", uuid::Uuid::new_v4().simple(), format.extension())
}

/// Suggested asset title for `url`, falling back to a random name when the
/// path has no usable base name.
///
/// # Examples
///
/// - `suggested_title("https://example.com/cat.png", Png)` → `"cat"`
/// - `suggested_title("https://example.com/", Png)` → `"<random>.png"`
pub fn suggested_title(url: &str, format: DetectedFormat) -> String {
    let stem = last_path_segment(url)
        .map(|seg| sanitize_title(strip_extension(&seg)))
        .filter(|s| !s.is_empty() && s != "." && s != "..");
    match stem {
        Some(s) => s,
        None => random_filename(format),
    }
}

/// Sanitizes a candidate title so it is also safe as a Linux filename.
///
/// - Replaces NUL, `/`, `\`, and control characters with `_`
/// - Trims leading/trailing spaces, dots and underscores
/// - Collapses consecutive underscores
/// - Limits length to 255 bytes
pub fn sanitize_title(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;

    for c in name.chars() {
        let replacement = if c == '\0' || c == '/' || c == '\\' || c.is_control() {
            '_'
        } else {
            c
        };

        if replacement == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(replacement);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == ' ' || c == '\t' || c == '.' || c == '_');

    if trimmed.len() > NAME_MAX {
        let mut take = NAME_MAX;
        while take > 0 && !trimmed.is_char_boundary(take) {
            take -= 1;
        }
        trimmed[..take].to_string()
    } else {
        trimmed.to_string()
    }
}
