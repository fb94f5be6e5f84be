//! Extracts the uploaded photo from a request body
//!
//! Accepts either `multipart/form-data` (the browser sends the photo in a
//! field named `file`) or a raw body with an `image/*` content type.

use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("missing multipart boundary")]
    MissingBoundary,
    #[error("no file field in multipart body")]
    MissingFile,
    #[error("empty upload")]
    Empty,
}

/// Pull the image bytes out of a request body
pub fn extract_image(content_type: Option<&str>, body: Bytes) -> Result<Bytes, UploadError> {
    let image = match content_type {
        Some(ct) if ct.trim_start().to_ascii_lowercase().starts_with("multipart/form-data") => {
            let boundary = boundary_of(ct).ok_or(UploadError::MissingBoundary)?;
            file_part(&body, &boundary).ok_or(UploadError::MissingFile)?
        }
        _ => body,
    };

    if image.is_empty() {
        return Err(UploadError::Empty);
    }
    Ok(image)
}

/// `boundary` parameter of a multipart content type, quotes stripped
fn boundary_of(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("boundary") {
            let value = value.trim().trim_matches('"');
            (!value.is_empty()).then(|| value.to_string())
        } else {
            None
        }
    })
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..].windows(needle.len()).position(|w| w == needle).map(|p| p + from)
}

/// Body of the `file` field, or of the first part carrying a filename
fn file_part(body: &Bytes, boundary: &str) -> Option<Bytes> {
    let delimiter = format!("--{}", boundary);
    let delimiter = delimiter.as_bytes();
    let mut fallback = None;

    let mut cursor = find(body, delimiter, 0)? + delimiter.len();
    loop {
        // "--" right after a delimiter closes the body
        if body[cursor..].starts_with(b"--") {
            break;
        }
        let headers_start = cursor + 2; // CRLF after delimiter
        let headers_end = find(body, b"\r\n\r\n", headers_start)?;
        let content_start = headers_end + 4;
        let next = find(body, delimiter, content_start)?;
        // Part content ends with the CRLF that precedes the next delimiter
        let content_end = next.saturating_sub(2).max(content_start);

        let headers = String::from_utf8_lossy(&body[headers_start..headers_end]).to_ascii_lowercase();
        let disposition = headers
            .lines()
            .find(|l| l.starts_with("content-disposition:"))
            .unwrap_or_default();

        if disposition.contains("name=\"file\"") {
            return Some(body.slice(content_start..content_end));
        }
        if fallback.is_none() && disposition.contains("filename=") {
            fallback = Some(body.slice(content_start..content_end));
        }

        cursor = next + delimiter.len();
    }

    fallback
}
