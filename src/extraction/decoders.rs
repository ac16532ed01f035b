//! PDF and DOCX decoders.

use std::io::{Cursor, Read};

use quick_xml::Reader;
use quick_xml::events::Event;

use super::{DocumentDecoder, ExtractionError, MediaType};

const DOCX_BODY_PART: &str = "word/document.xml";

/// Decodes PDF text layers with `pdf-extract`.
pub struct PdfDecoder;

impl DocumentDecoder for PdfDecoder {
    fn media_type(&self) -> MediaType {
        MediaType::Pdf
    }

    fn decode(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        pdf_extract::extract_text_from_mem(bytes).map_err(|error| {
            ExtractionError::CorruptDocument(format!("failed to decode PDF: {error}"))
        })
    }
}

/// Decodes the main document part of a DOCX archive, one paragraph per block.
pub struct DocxDecoder;

impl DocumentDecoder for DocxDecoder {
    fn media_type(&self) -> MediaType {
        MediaType::Docx
    }

    fn decode(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|error| {
            ExtractionError::CorruptDocument(format!("failed to open DOCX archive: {error}"))
        })?;

        let mut body = String::new();
        archive
            .by_name(DOCX_BODY_PART)
            .map_err(|_| {
                ExtractionError::CorruptDocument(format!("DOCX archive is missing {DOCX_BODY_PART}"))
            })?
            .read_to_string(&mut body)
            .map_err(|error| {
                ExtractionError::CorruptDocument(format!("failed to read {DOCX_BODY_PART}: {error}"))
            })?;

        paragraphs_from_document_xml(&body)
    }
}

fn paragraphs_from_document_xml(xml: &str) -> Result<String, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut output = String::new();
    let mut paragraph = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => match element.local_name().as_ref() {
                b"p" => paragraph.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(element)) => match element.local_name().as_ref() {
                b"tab" => paragraph.push('\t'),
                b"br" | b"cr" => paragraph.push('\n'),
                b"p" => output.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::End(element)) => match element.local_name().as_ref() {
                b"p" => {
                    if !paragraph.trim().is_empty() {
                        output.push_str(&paragraph);
                        output.push_str("\n\n");
                    }
                    paragraph.clear();
                }
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Text(text)) if in_text => {
                let unescaped = text.unescape().map_err(|error| {
                    ExtractionError::CorruptDocument(format!("invalid DOCX text run: {error}"))
                })?;
                paragraph.push_str(&unescaped);
            }
            Ok(Event::Eof) => break,
            Err(error) => {
                return Err(ExtractionError::CorruptDocument(format!(
                    "malformed DOCX XML at byte {}: {error}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Build a minimal DOCX archive containing the given paragraphs.
    fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
        let mut body = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
        );
        for paragraph in paragraphs {
            body.push_str(r#"<w:p><w:r><w:t xml:space="preserve">"#);
            body.push_str(
                &paragraph
                    .replace('&', "&amp;")
                    .replace('<', "&lt;")
                    .replace('>', "&gt;"),
            );
            body.push_str("</w:t></w:r></w:p>");
        }
        body.push_str("</w:body></w:document>");

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        writer.start_file(DOCX_BODY_PART, options).expect("start part");
        writer.write_all(body.as_bytes()).expect("write part");
        writer.finish().expect("finish archive").into_inner()
    }

    #[test]
    fn docx_paragraphs_are_separated_by_blank_lines() {
        let bytes = docx_bytes(&["Article 1 - Object", "Rent is 5 000 MAD & charges."]);
        let text = DocxDecoder.decode(&bytes).expect("decoded");
        assert_eq!(text, "Article 1 - Object\n\nRent is 5 000 MAD & charges.\n\n");
    }

    #[test]
    fn docx_tabs_and_breaks_are_preserved() {
        let xml = r#"<w:document xmlns:w="x"><w:body><w:p><w:r><w:t>Left</w:t><w:tab/><w:t>Right</w:t><w:br/><w:t>Next</w:t></w:r></w:p></w:body></w:document>"#;
        let text = paragraphs_from_document_xml(xml).expect("parsed");
        assert_eq!(text, "Left\tRight\nNext\n\n");
    }

    #[test]
    fn archive_without_body_is_corrupt() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(
                "word/styles.xml",
                SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored),
            )
            .expect("start");
        writer.write_all(b"<w:styles/>").expect("write");
        let bytes = writer.finish().expect("finish").into_inner();

        let error = DocxDecoder.decode(&bytes).unwrap_err();
        assert!(matches!(error, ExtractionError::CorruptDocument(message) if message.contains("word/document.xml")));
    }

    #[test]
    fn non_zip_bytes_are_corrupt() {
        let error = DocxDecoder.decode(b"plain text").unwrap_err();
        assert!(matches!(error, ExtractionError::CorruptDocument(_)));
    }
}
