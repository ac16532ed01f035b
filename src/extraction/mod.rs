//! Text extraction: raw uploaded bytes in, cleaned plain text out.
//!
//! Decoders are pluggable per media type through [`DocumentDecoder`]. The extractor resolves the
//! media type, hands the bytes to the matching decoder, normalizes the result with
//! [`clean_text`], and rejects documents whose cleaned text is too short to analyze.

mod clean;
mod decoders;

pub use clean::clean_text;
pub use decoders::{DocxDecoder, PdfDecoder};

use std::path::Path;
use thiserror::Error;

/// MIME type of PDF uploads.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";
/// MIME type of Office Open XML word-processing uploads.
pub const DOCX_MEDIA_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
/// MIME type of legacy binary Word uploads.
pub const DOC_MEDIA_TYPE: &str = "application/msword";

/// Errors raised while turning an upload into analyzable text. All of them abort the request.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Media type has no decoder (legacy `.doc` included).
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),
    /// Decoder could not parse the byte stream.
    #[error("Corrupt document: {0}")]
    CorruptDocument(String),
    /// Cleaned text is shorter than the minimum viable content.
    #[error("Document contains too little text to analyze ({length} characters, minimum {minimum})")]
    EmptyContent {
        /// Character count of the cleaned text.
        length: usize,
        /// Configured minimum character count.
        minimum: usize,
    },
}

/// Media types understood by the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaType {
    /// Portable Document Format.
    Pdf,
    /// Office Open XML word-processing document.
    Docx,
    /// Legacy binary Word document, rejected with a conversion hint.
    LegacyDoc,
    /// Anything else, kept verbatim for error reporting.
    Other(String),
}

impl MediaType {
    /// Resolve the effective media type from the declared type, falling back to the file
    /// extension when the declared type is missing or generic.
    pub fn resolve(declared: &str, original_name: &str) -> Self {
        let normalized = declared
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        match normalized.as_str() {
            PDF_MEDIA_TYPE => Self::Pdf,
            DOCX_MEDIA_TYPE => Self::Docx,
            DOC_MEDIA_TYPE => Self::LegacyDoc,
            "" | "application/octet-stream" => Self::from_extension(original_name)
                .unwrap_or_else(|| Self::Other(if normalized.is_empty() {
                    "unknown".to_string()
                } else {
                    normalized
                })),
            _ => Self::Other(normalized),
        }
    }

    fn from_extension(original_name: &str) -> Option<Self> {
        let extension = Path::new(original_name)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "doc" => Some(Self::LegacyDoc),
            _ => None,
        }
    }
}

/// Uploaded document, owned transiently by a single extraction call.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// Raw file contents.
    pub bytes: Vec<u8>,
    /// Media type declared by the uploader.
    pub declared_media_type: String,
    /// File name supplied by the uploader.
    pub original_name: String,
    /// Size of the upload in bytes.
    pub size: usize,
}

impl RawDocument {
    /// Wrap uploaded bytes, recording their size.
    pub fn new(
        bytes: Vec<u8>,
        declared_media_type: impl Into<String>,
        original_name: impl Into<String>,
    ) -> Self {
        let size = bytes.len();
        Self {
            bytes,
            declared_media_type: declared_media_type.into(),
            original_name: original_name.into(),
            size,
        }
    }

    /// Effective media type of the upload.
    pub fn media_type(&self) -> MediaType {
        MediaType::resolve(&self.declared_media_type, &self.original_name)
    }
}

/// Cleaned, non-empty document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText(String);

impl ExtractedText {
    /// Clean arbitrary text and enforce the minimum content length.
    pub fn from_raw(raw: &str, min_content_chars: usize) -> Result<Self, ExtractionError> {
        let cleaned = clean_text(raw);
        let length = cleaned.chars().count();
        let minimum = min_content_chars.max(1);
        if length < minimum {
            return Err(ExtractionError::EmptyContent { length, minimum });
        }
        Ok(Self(cleaned))
    }

    /// Wrap text produced by the pipeline itself (condensed excerpts).
    pub(crate) fn condensed(text: String) -> Self {
        Self(text)
    }

    /// Borrow the text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of characters (not bytes).
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }

    /// Consume the wrapper.
    pub fn into_string(self) -> String {
        self.0
    }
}

/// Decoder for one media type.
pub trait DocumentDecoder: Send + Sync {
    /// Media type this decoder accepts.
    fn media_type(&self) -> MediaType;

    /// Decode raw bytes into uncleaned text.
    fn decode(&self, bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// Routes uploads to the decoder registered for their media type.
pub struct TextExtractor {
    decoders: Vec<Box<dyn DocumentDecoder>>,
    min_content_chars: usize,
}

impl TextExtractor {
    /// Build an extractor with the PDF and DOCX decoders registered.
    pub fn new(min_content_chars: usize) -> Self {
        Self::with_decoders(
            vec![Box::new(PdfDecoder), Box::new(DocxDecoder)],
            min_content_chars,
        )
    }

    /// Build an extractor with an explicit decoder set.
    pub fn with_decoders(decoders: Vec<Box<dyn DocumentDecoder>>, min_content_chars: usize) -> Self {
        Self {
            decoders,
            min_content_chars,
        }
    }

    /// Extract cleaned text from an uploaded document.
    pub fn extract(&self, document: &RawDocument) -> Result<ExtractedText, ExtractionError> {
        let media_type = document.media_type();
        tracing::debug!(
            name = %document.original_name,
            declared = %document.declared_media_type,
            resolved = ?media_type,
            size = document.size,
            "Extracting document text"
        );

        if media_type == MediaType::LegacyDoc {
            return Err(ExtractionError::UnsupportedFormat(
                "legacy .doc files are not supported; convert the document to DOCX or PDF and upload it again"
                    .to_string(),
            ));
        }

        let decoder = self
            .decoders
            .iter()
            .find(|decoder| decoder.media_type() == media_type)
            .ok_or_else(|| {
                let label = match &media_type {
                    MediaType::Other(value) => value.clone(),
                    other => format!("{other:?}"),
                };
                ExtractionError::UnsupportedFormat(format!(
                    "{label}; upload a PDF or DOCX document"
                ))
            })?;

        let raw = decoder.decode(&document.bytes)?;
        let text = ExtractedText::from_raw(&raw, self.min_content_chars)?;
        tracing::debug!(
            name = %document.original_name,
            raw_chars = raw.chars().count(),
            cleaned_chars = text.char_len(),
            "Document text extracted"
        );
        Ok(text)
    }
}
