use std::fmt;
use std::path::Path;

use base64::{engine::general_purpose, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::StudioError;

static DATA_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:([a-zA-Z0-9]+/[a-zA-Z0-9\-.+]+);base64,(.+)$").expect("valid data url regex")
});

/// A `data:<mime>;base64,<payload>` string split into its two halves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime_type: String,
    pub data: String,
}

impl DataUrl {
    pub fn parse(value: &str) -> Result<Self, StudioError> {
        let captures = DATA_URL_RE
            .captures(value)
            .ok_or_else(|| StudioError::MalformedDataUrl(truncate_for_error(value)))?;
        Ok(DataUrl {
            mime_type: captures[1].to_string(),
            data: captures[2].to_string(),
        })
    }

    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        DataUrl {
            mime_type: mime_type.to_string(),
            data: general_purpose::STANDARD.encode(bytes),
        }
    }

    pub fn png(data: impl Into<String>) -> Self {
        DataUrl {
            mime_type: "image/png".to_string(),
            data: data.into(),
        }
    }

    pub fn decode(&self) -> Result<Vec<u8>, StudioError> {
        general_purpose::STANDARD
            .decode(self.data.trim())
            .map_err(|err| StudioError::MalformedDataUrl(format!("payload is not base64: {err}")))
    }
}

impl fmt::Display for DataUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.data)
    }
}

fn truncate_for_error(value: &str) -> String {
    const LIMIT: usize = 48;
    if value.chars().count() <= LIMIT {
        return value.to_string();
    }
    let truncated: String = value.chars().take(LIMIT).collect();
    format!("{truncated}...")
}

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

fn mime_for_extension(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" | "heif" => Some("image/heic"),
        _ => None,
    }
}

pub async fn read_file_as_data_url(path: &Path) -> Result<String, StudioError> {
    let bytes = tokio::fs::read(path).await?;
    let mime_type = detect_mime_type(&bytes)
        .or_else(|| mime_for_extension(path).map(str::to_string))
        .unwrap_or_else(|| "application/octet-stream".to_string());
    Ok(DataUrl::from_bytes(&mime_type, &bytes).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
    ];

    #[test]
    fn parses_mime_type_and_payload() {
        let parsed = DataUrl::parse("data:image/svg+xml;base64,PHN2Zz4=").unwrap();
        assert_eq!(parsed.mime_type, "image/svg+xml");
        assert_eq!(parsed.data, "PHN2Zz4=");
        assert_eq!(parsed.to_string(), "data:image/svg+xml;base64,PHN2Zz4=");
    }

    #[test]
    fn rejects_strings_that_are_not_data_urls() {
        for value in [
            "not-a-data-url",
            "data:image/png;base64,",
            "data:;base64,AAAA",
            "data:image/png,AAAA",
            "data:image/p_ng;base64,AAAA",
        ] {
            assert!(
                matches!(DataUrl::parse(value), Err(StudioError::MalformedDataUrl(_))),
                "{value} should be rejected"
            );
        }
    }

    #[test]
    fn detects_png_from_content() {
        assert_eq!(detect_mime_type(PNG_HEADER).as_deref(), Some("image/png"));
        assert_eq!(detect_mime_type(b"plain text"), None);
    }

    #[tokio::test]
    async fn reads_file_into_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.bin");
        std::fs::write(&path, PNG_HEADER).unwrap();

        let data_url = read_file_as_data_url(&path).await.unwrap();
        let parsed = DataUrl::parse(&data_url).unwrap();
        assert_eq!(parsed.mime_type, "image/png");
        assert_eq!(parsed.decode().unwrap(), PNG_HEADER);
    }

    #[tokio::test]
    async fn falls_back_to_extension_then_octet_stream() {
        let dir = tempfile::tempdir().unwrap();
        let jpg = dir.path().join("photo.JPG");
        std::fs::write(&jpg, b"no magic here").unwrap();
        let other = dir.path().join("notes.txt");
        std::fs::write(&other, b"no magic here").unwrap();

        let jpg_url = read_file_as_data_url(&jpg).await.unwrap();
        assert!(jpg_url.starts_with("data:image/jpeg;base64,"));
        let other_url = read_file_as_data_url(&other).await.unwrap();
        assert!(other_url.starts_with("data:application/octet-stream;base64,"));
    }
}
