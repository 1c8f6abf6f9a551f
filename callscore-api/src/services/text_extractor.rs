//! Transcript document text extraction
//!
//! Supports plain text, PDF (`pdf-extract`) and Word documents (`zip` +
//! `quick-xml` over `word/document.xml`). Anything else is rejected before
//! any bytes are parsed.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{BufReader, Cursor, Read};
use thiserror::Error;

/// Extensions accepted for transcript documents
pub const ALLOWED_EXTENSIONS: &[&str] = &[".txt", ".pdf", ".docx", ".doc"];

/// Media types accepted for transcript documents
pub const ALLOWED_MEDIA_TYPES: &[&str] = &[
    "text/plain",
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Unsupported transcript file type: {0}. Use .txt, .pdf, or .docx")]
    UnsupportedFormat(String),

    #[error("Failed to read PDF: {0}")]
    Pdf(String),

    #[error("Failed to read Word document: {0}")]
    Document(String),

    #[error("Extraction task failed: {0}")]
    Task(String),
}

/// Document kinds the extractor understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Pdf,
    WordDocument,
}

fn extension(file_name: &str) -> String {
    file_name
        .rfind('.')
        .map(|idx| file_name[idx..].to_ascii_lowercase())
        .unwrap_or_default()
}

/// True when the name or media type is on the allow list
pub fn is_allowed_transcript_file(file_name: &str, mime_type: Option<&str>) -> bool {
    let ext = extension(file_name);
    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return true;
    }
    mime_type
        .map(|mime| ALLOWED_MEDIA_TYPES.contains(&mime.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Decide how to read a document, extension first, media type second
pub fn detect_format(file_name: &str, mime_type: Option<&str>) -> Option<DocumentFormat> {
    let ext = extension(file_name);
    let mime = mime_type.map(str::to_ascii_lowercase).unwrap_or_default();

    if ext == ".txt" || mime == "text/plain" {
        Some(DocumentFormat::PlainText)
    } else if ext == ".pdf" || mime == "application/pdf" {
        Some(DocumentFormat::Pdf)
    } else if ext == ".docx"
        || ext == ".doc"
        || mime.contains("wordprocessingml")
        || mime.contains("msword")
    {
        Some(DocumentFormat::WordDocument)
    } else {
        None
    }
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        mime_type: Option<&str>,
    ) -> Result<String, ExtractError>;
}

/// In-process extractor
#[derive(Debug, Default, Clone)]
pub struct LocalTextExtractor;

#[async_trait]
impl TextExtractor for LocalTextExtractor {
    async fn extract(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        mime_type: Option<&str>,
    ) -> Result<String, ExtractError> {
        let format = detect_format(file_name, mime_type)
            .ok_or_else(|| ExtractError::UnsupportedFormat(file_name.to_string()))?;

        match format {
            DocumentFormat::PlainText => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            DocumentFormat::Pdf => tokio::task::spawn_blocking(move || extract_pdf(&bytes))
                .await
                .map_err(|e| ExtractError::Task(e.to_string()))?,
            DocumentFormat::WordDocument => {
                tokio::task::spawn_blocking(move || extract_docx(&bytes))
                    .await
                    .map_err(|e| ExtractError::Task(e.to_string()))?
            }
        }
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Read the text runs of `word/document.xml`, one line per paragraph
fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractError::Document(format!("not a DOCX archive: {}", e)))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractError::Document(format!("missing word/document.xml: {}", e)))?
        .read_to_string(&mut xml)
        .map_err(|e| ExtractError::Document(e.to_string()))?;

    let mut reader = Reader::from_reader(BufReader::new(xml.as_bytes()));
    let mut buf = Vec::new();
    let mut text = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_text_run = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text_run = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text_run => {
                let run = e
                    .unescape()
                    .map_err(|e| ExtractError::Document(e.to_string()))?;
                text.push_str(&run);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Document(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_with_body(body: &str) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            writer
                .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            let xml = format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
                body
            );
            writer.write_all(xml.as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_allow_list_by_extension_or_type() {
        assert!(is_allowed_transcript_file("call.TXT", None));
        assert!(is_allowed_transcript_file("call.docx", None));
        assert!(is_allowed_transcript_file("call.doc", None));
        assert!(is_allowed_transcript_file("download", Some("application/pdf")));
        assert!(!is_allowed_transcript_file("call.mp3", Some("audio/mpeg")));
        assert!(!is_allowed_transcript_file("notes", None));
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format("a.txt", None), Some(DocumentFormat::PlainText));
        assert_eq!(detect_format("a.pdf", None), Some(DocumentFormat::Pdf));
        assert_eq!(
            detect_format("a", Some("application/msword")),
            Some(DocumentFormat::WordDocument)
        );
        assert_eq!(detect_format("a.rtf", Some("application/rtf")), None);
    }

    #[tokio::test]
    async fn test_plain_text_is_passed_through() {
        let text = LocalTextExtractor
            .extract(b"Speaker A: hi".to_vec(), "call.txt", Some("text/plain"))
            .await
            .unwrap();
        assert_eq!(text, "Speaker A: hi");
    }

    #[tokio::test]
    async fn test_unsupported_format_is_rejected() {
        let err = LocalTextExtractor
            .extract(vec![1, 2, 3], "call.rtf", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn test_docx_paragraphs_become_lines() {
        let bytes = docx_with_body(
            "<w:p><w:r><w:t>Speaker A: Hi</w:t></w:r></w:p><w:p><w:r><w:t xml:space=\"preserve\">Speaker B: </w:t></w:r><w:r><w:t>Hello &amp; welcome</w:t></w:r></w:p>",
        );
        let text = LocalTextExtractor
            .extract(bytes, "call.docx", None)
            .await
            .unwrap();
        assert_eq!(text, "Speaker A: Hi\nSpeaker B: Hello & welcome\n");
    }

    #[tokio::test]
    async fn test_corrupt_docx_is_an_error() {
        let err = LocalTextExtractor
            .extract(b"not a zip".to_vec(), "call.docx", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Document(_)));
    }
}
