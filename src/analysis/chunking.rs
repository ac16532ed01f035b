//! Paragraph-first segmentation of long contracts.
//!
//! Segments are packed greedily from paragraphs (blank-line separated) so that each stays
//! within a character budget. A paragraph that alone exceeds the budget is split on sentence
//! boundaries instead, and the tail of that split keeps accumulating with the paragraphs that
//! follow. A single sentence longer than the budget is emitted unsplit. Sizes are measured in
//! characters, never bytes, so multi-byte text is never cut inside a code point.

use regex::Regex;
use std::sync::LazyLock;

use super::types::ChunkingError;

static PARAGRAPH_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n[ \t]*\n").expect("paragraph pattern compiles")
});

static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[.!?]+(?:\s+|$)").expect("sentence end pattern compiles")
});

const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Split `text` into at most `max_segments` segments of roughly `max_chars` characters.
///
/// Text that already fits is returned as a single trimmed segment; blank text yields none.
/// Segments beyond `max_segments` are dropped.
pub fn chunk_text(
    text: &str,
    max_chars: usize,
    max_segments: usize,
) -> Result<Vec<String>, ChunkingError> {
    if max_chars == 0 {
        return Err(ChunkingError::InvalidSegmentSize);
    }

    let mut segments = split_segments(text, max_chars);
    if segments.len() > max_segments {
        tracing::info!(
            produced = segments.len(),
            kept = max_segments,
            "Dropping segments beyond the configured cap"
        );
        segments.truncate(max_segments);
    }
    Ok(segments)
}

fn split_segments(text: &str, max_chars: usize) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if char_len(trimmed) <= max_chars {
        return vec![trimmed.to_string()];
    }

    let mut packer = Packer::new(max_chars);
    for paragraph in PARAGRAPH_BREAK.split(trimmed) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        if packer.fits(paragraph, PARAGRAPH_SEPARATOR) {
            packer.append(paragraph, PARAGRAPH_SEPARATOR);
            continue;
        }

        packer.flush();
        if char_len(paragraph) <= max_chars {
            packer.append(paragraph, PARAGRAPH_SEPARATOR);
            continue;
        }

        for sentence in sentences(paragraph) {
            if !packer.fits(sentence.trim_end(), "") {
                packer.flush();
            }
            packer.append(sentence, "");
        }
    }
    packer.finish()
}

/// Split `text` into sentences, each keeping its trailing whitespace.
///
/// A terminator only ends a sentence when whitespace or the end of text follows it, so
/// figures such as `10.000` or `3.5%` stay in one piece. Concatenating the pieces yields
/// `text` again.
pub(crate) fn sentences(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for boundary in SENTENCE_END.find_iter(text) {
        pieces.push(&text[start..boundary.end()]);
        start = boundary.end();
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

struct Packer {
    max_chars: usize,
    current: String,
    current_chars: usize,
    segments: Vec<String>,
}

impl Packer {
    fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            current: String::new(),
            current_chars: 0,
            segments: Vec::new(),
        }
    }

    fn fits(&self, piece: &str, separator: &str) -> bool {
        let joined = if self.current.is_empty() {
            0
        } else {
            separator.len()
        };
        self.current_chars + joined + char_len(piece) <= self.max_chars
    }

    fn append(&mut self, piece: &str, separator: &str) {
        if !self.current.is_empty() {
            self.current.push_str(separator);
            self.current_chars += separator.len();
        }
        self.current.push_str(piece);
        self.current_chars += char_len(piece);
    }

    fn flush(&mut self) {
        let segment = self.current.trim();
        if !segment.is_empty() {
            self.segments.push(segment.to_string());
        }
        self.current.clear();
        self.current_chars = 0;
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.segments
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(label: usize, words: usize) -> String {
        (0..words)
            .map(|index| format!("w{label}x{index}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn short_text_is_one_trimmed_segment() {
        let segments = chunk_text("  Article 1. Object.  \n", 100, 3).expect("chunks");
        assert_eq!(segments, vec!["Article 1. Object."]);
    }

    #[test]
    fn blank_text_has_no_segments() {
        assert!(chunk_text(" \n\n ", 100, 3).expect("chunks").is_empty());
    }

    #[test]
    fn zero_size_is_rejected() {
        let error = chunk_text("hello", 0, 3).unwrap_err();
        assert!(matches!(error, ChunkingError::InvalidSegmentSize));
    }

    #[test]
    fn paragraphs_are_packed_greedily() {
        let text = "Alpha alpha.\n\nBeta beta.\n\nGamma gamma gamma.";
        let segments = chunk_text(text, 26, 10).expect("chunks");
        assert_eq!(segments, vec!["Alpha alpha.\n\nBeta beta.", "Gamma gamma gamma."]);
    }

    #[test]
    fn oversized_paragraph_is_split_on_sentences_and_tail_carries_over() {
        let text = "First sentence here. Second sentence here! Third one?\n\nShort tail.";
        let segments = chunk_text(text, 45, 10).expect("chunks");
        assert_eq!(
            segments,
            vec![
                "First sentence here. Second sentence here!",
                "Third one?\n\nShort tail.",
            ]
        );
    }

    #[test]
    fn single_sentence_longer_than_budget_is_kept_whole() {
        let long = "a".repeat(80);
        let segments = chunk_text(&format!("{long}\n\nend"), 30, 10).expect("chunks");
        assert_eq!(segments[0], long);
        assert_eq!(segments[1], "end");
    }

    #[test]
    fn segments_respect_budget_cap_and_order() {
        let paragraphs: Vec<String> = (0..40).map(|label| paragraph(label, 12)).collect();
        let text = paragraphs.join("\n\n");
        let segments = chunk_text(&text, 300, 100).expect("chunks");

        assert!(segments.len() > 1);
        for segment in &segments {
            assert!(segment.chars().count() <= 300);
            assert!(!segment.trim().is_empty());
        }
        assert_eq!(segments.join("\n\n"), text);

        let capped = chunk_text(&text, 300, 3).expect("chunks");
        assert_eq!(capped.len(), 3);
        assert_eq!(capped[..], segments[..3]);
    }

    #[test]
    fn figures_survive_sentence_splitting() {
        let text = "The deposit of 10.000 MAD is due. ".repeat(4);
        let segments = chunk_text(&text, 60, 10).expect("chunks");
        assert_eq!(segments.len(), 4);
        for segment in &segments {
            assert_eq!(segment, "The deposit of 10.000 MAD is due.");
        }

        let text = "Late payments accrue interest at 3.5% per month. The cap is 1.250,00 MAD! Agreed?";
        let segments = chunk_text(text, 55, 10).expect("chunks");
        assert_eq!(
            segments,
            vec![
                "Late payments accrue interest at 3.5% per month.",
                "The cap is 1.250,00 MAD! Agreed?",
            ]
        );
    }

    #[test]
    fn sentence_pieces_reassemble_the_original() {
        let text = "Art. 3 applies.  Fee: 2.5 MAD!\nSee annex";
        let pieces = sentences(text);
        assert_eq!(pieces, vec!["Art. ", "3 applies.  ", "Fee: 2.5 MAD!\n", "See annex"]);
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn multibyte_text_is_measured_in_characters() {
        let text = "Résiliation é é é.\n\nPénalité à payer.";
        let segments = chunk_text(text, 20, 10).expect("chunks");
        assert_eq!(segments, vec!["Résiliation é é é.", "Pénalité à payer."]);
    }
}
