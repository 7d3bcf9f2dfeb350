//! Helpers for the multipart schema-upload flow. Multipart framing itself
//! is handled by axum's extractor in `handlers::schemas`; this module is
//! the part that can be unit tested without a running server.

use std::io::Read;

use zip::ZipArchive;

use crate::error::{validation_error, ApiError};

const ALLOWED_EXTENSIONS: &[&str] = &[".avsc", ".json", ".proto", ".zip"];

pub fn extension_of(filename: &str) -> Option<&str> {
    ALLOWED_EXTENSIONS
        .iter()
        .find(|ext| filename.to_ascii_lowercase().ends_with(*ext))
        .copied()
}

/// Rejects filenames whose extension isn't in the allowed set.
pub fn validate_extension(filename: &str) -> Result<&str, ApiError> {
    extension_of(filename).ok_or_else(|| {
        validation_error(vec![format!(
            "{filename}: unsupported extension; expected one of {ALLOWED_EXTENSIONS:?}"
        )])
    })
}

/// Rejects empty files and, for `.json`/`.avsc`, invalid JSON content
/// (proto schemas are not JSON and are accepted as opaque text).
pub fn validate_content(filename: &str, bytes: &[u8], max_bytes: usize) -> Result<(), ApiError> {
    if bytes.is_empty() {
        return Err(validation_error(vec![format!("{filename}: file is empty")]));
    }
    if bytes.len() > max_bytes {
        return Err(validation_error(vec![format!(
            "{filename}: exceeds max upload size of {max_bytes} bytes"
        )]));
    }
    if filename.ends_with(".json") || filename.ends_with(".avsc") {
        if let Ok(text) = std::str::from_utf8(bytes) {
            if serde_json::from_str::<serde_json::Value>(text).is_err() {
                return Err(validation_error(vec![format!("{filename}: invalid JSON")]));
            }
        } else {
            return Err(validation_error(vec![format!("{filename}: invalid JSON")]));
        }
    }
    Ok(())
}

/// The file stem used as a bundle's subject: `bundle.{stem}`.
pub fn bundle_subject(filename: &str) -> String {
    let stem = filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(filename);
    format!("bundle.{stem}")
}

pub struct ExtractedEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Unpacks a ZIP archive, keeping only entries with a recognized schema
/// extension; the archive must contain at least one.
pub fn extract_zip(bytes: &[u8]) -> Result<Vec<ExtractedEntry>, ApiError> {
    let cursor = std::io::Cursor::new(bytes);
    let mut archive = ZipArchive::new(cursor)
        .map_err(|e| validation_error(vec![format!("invalid zip archive: {e}")]))?;

    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| validation_error(vec![format!("invalid zip archive: {e}")]))?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        if extension_of(&name).is_none() || name.ends_with(".zip") {
            continue;
        }
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| validation_error(vec![format!("{name}: failed reading zip entry: {e}")]))?;
        entries.push(ExtractedEntry { name, bytes });
    }

    if entries.is_empty() {
        return Err(validation_error(vec![
            "zip archive must contain at least one schema file".to_string(),
        ]));
    }
    Ok(entries)
}

/// Object-storage key for a registered schema artifact.
pub fn artifact_key(env: &str, subject: &str, version: i32) -> String {
    format!("{env}/{subject}/{version}/schema.txt")
}

/// Object-storage key for the raw uploaded file, preserved alongside the
/// registered artifact for audit/debugging.
pub fn raw_upload_key(env: &str, upload_id: &str, filename: &str) -> String {
    format!("{env}/uploads/{upload_id}/{filename}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_extension() {
        assert!(validate_extension("schema.txt").is_err());
        assert!(validate_extension("schema.avsc").is_ok());
    }

    #[test]
    fn rejects_empty_file() {
        let err = validate_content("a.avsc", b"", 1024).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn rejects_invalid_json() {
        let err = validate_content("a.json", b"{not json", 1024).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn accepts_valid_json() {
        assert!(validate_content("a.avsc", br#"{"type":"record"}"#, 1024).is_ok());
    }

    #[test]
    fn bundle_subject_uses_file_stem() {
        assert_eq!(bundle_subject("orders.zip"), "bundle.orders");
    }

    #[test]
    fn artifact_key_matches_layout() {
        assert_eq!(artifact_key("dev", "dev.orders-value", 3), "dev/dev.orders-value/3/schema.txt");
    }

    #[test]
    fn file_size_boundary_at_ten_mebibytes() {
        const TEN_MIB: usize = 10 * 1024 * 1024;
        let at_limit = vec![b'x'; TEN_MIB];
        assert!(validate_content("a.proto", &at_limit, TEN_MIB).is_ok());

        let over_limit = vec![b'x'; TEN_MIB + 1];
        assert!(validate_content("a.proto", &over_limit, TEN_MIB).is_err());
    }
}
