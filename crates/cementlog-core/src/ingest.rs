use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use thiserror::Error;

/// Well-log container formats accepted for interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Pdf,
    Las,
}

impl LogKind {
    /// Classify a file purely by its extension, ignoring case.
    pub fn from_file_name(file_name: &str) -> Result<Self, IngestError> {
        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".pdf") {
            Ok(Self::Pdf)
        } else if lower.ends_with(".las") {
            Ok(Self::Las)
        } else {
            Err(IngestError::UnsupportedFormat {
                file_name: file_name.to_string(),
            })
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, IngestError> {
        Self::from_file_name(&file_name_of(path))
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Las => "las",
        }
    }
}

/// Decoded file content ready to be attached to an interpretation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogPayload {
    /// Base64 of the raw PDF bytes.
    Pdf { base64: String },
    /// LAS file decoded verbatim as UTF-8.
    Las { text: String },
}

impl LogPayload {
    pub fn kind(&self) -> LogKind {
        match self {
            Self::Pdf { .. } => LogKind::Pdf,
            Self::Las { .. } => LogKind::Las,
        }
    }
}

/// Reasons a user-selected file never reaches the interpretation client.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported format for `{file_name}`: only PDF or LAS files are supported")]
    UnsupportedFormat { file_name: String },
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("`{file_name}` is not valid UTF-8 text")]
    Encoding {
        file_name: String,
        #[source]
        source: std::str::Utf8Error,
    },
    #[error("`{file_name}` is empty")]
    Empty { file_name: String },
}

impl IngestError {
    /// Message shown to the user when classification rejects a file.
    pub const UNSUPPORTED_MESSAGE: &'static str = "Only PDF or LAS files are supported.";

    pub fn is_unsupported_format(&self) -> bool {
        matches!(self, Self::UnsupportedFormat { .. })
    }
}

/// Decode file bytes according to the kind implied by `file_name`.
pub fn ingest_bytes(file_name: &str, bytes: &[u8]) -> Result<LogPayload, IngestError> {
    let kind = LogKind::from_file_name(file_name)?;
    if bytes.is_empty() {
        return Err(IngestError::Empty {
            file_name: file_name.to_string(),
        });
    }
    let payload = match kind {
        LogKind::Pdf => LogPayload::Pdf {
            base64: BASE64.encode(bytes),
        },
        LogKind::Las => {
            let text = std::str::from_utf8(bytes).map_err(|source| IngestError::Encoding {
                file_name: file_name.to_string(),
                source,
            })?;
            LogPayload::Las {
                text: text.to_string(),
            }
        }
    };
    tracing::debug!(file = file_name, kind = kind.label(), bytes = bytes.len(), "ingested log file");
    Ok(payload)
}

/// Classify then read a file from disk. Unsupported files are rejected before any I/O.
pub async fn ingest_file(path: &Path) -> Result<LogPayload, IngestError> {
    LogKind::from_path(path)?;
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| IngestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    ingest_bytes(&file_name_of(path), &bytes)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(LogKind::from_file_name("WELL-7.PDF").unwrap(), LogKind::Pdf);
        assert_eq!(LogKind::from_file_name("well-7.las").unwrap(), LogKind::Las);
        assert_eq!(LogKind::from_file_name("Well-7.LaS").unwrap(), LogKind::Las);
    }

    #[test]
    fn other_extensions_are_unsupported() {
        for name in ["notes.txt", "log.pdf.bak", "las", "archive.zip", ""] {
            let err = LogKind::from_file_name(name).expect_err(name);
            assert!(err.is_unsupported_format(), "{name} should be unsupported");
        }
    }

    #[test]
    fn pdf_bytes_are_base64_encoded() {
        let payload = ingest_bytes("cbl.pdf", b"%PDF-1.4").unwrap();
        assert_eq!(
            payload,
            LogPayload::Pdf {
                base64: "JVBERi0xLjQ=".into()
            }
        );
    }

    #[test]
    fn las_bytes_are_kept_verbatim() {
        let text = "~VERSION INFORMATION\n VERS. 2.0 :\n~ASCII\n1200.0 12.5\n";
        let payload = ingest_bytes("well.las", text.as_bytes()).unwrap();
        assert_eq!(payload, LogPayload::Las { text: text.into() });
        assert_eq!(payload.kind(), LogKind::Las);
    }

    #[test]
    fn invalid_utf8_las_is_rejected() {
        let err = ingest_bytes("well.las", &[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, IngestError::Encoding { .. }));
    }

    #[test]
    fn empty_file_is_rejected() {
        let err = ingest_bytes("well.las", &[]).unwrap_err();
        assert!(matches!(err, IngestError::Empty { .. }));
    }

    #[tokio::test]
    async fn ingest_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("WELL.LAS");
        fs::write(&path, "~W\nSTRT.M 1200\n").unwrap();
        let payload = ingest_file(&path).await.unwrap();
        assert_eq!(
            payload,
            LogPayload::Las {
                text: "~W\nSTRT.M 1200\n".into()
            }
        );
    }

    #[tokio::test]
    async fn unsupported_file_is_rejected_before_reading() {
        let err = ingest_file(Path::new("/definitely/missing/notes.txt"))
            .await
            .unwrap_err();
        assert!(err.is_unsupported_format());
    }

    #[tokio::test]
    async fn missing_file_reports_read_error() {
        let err = ingest_file(Path::new("/definitely/missing/well.las"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Read { .. }));
    }
}
