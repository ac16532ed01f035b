//! Condensing oversized contracts into a single bounded excerpt.
//!
//! Three passes are tried in order and the first one that fits the budget wins:
//!
//! 1. Important lines: the opening and closing lines plus every line carrying an article or
//!    section marker, a legal keyword, or unusually long prose.
//! 2. Sections: the first and last paragraphs bracketing keyword sentences from the middle.
//! 3. Head/tail truncation around an explicit marker.
//!
//! Every pass keeps the beginning and the end of the document.

use regex::Regex;
use std::sync::LazyLock;

use super::chunking::sentences;
use crate::extraction::ExtractedText;

/// Marker placed between head and tail when the text had to be truncated.
pub const TRUNCATION_MARKER: &str = "[content truncated]";
const KEY_SECTIONS_MARKER: &str = "=== KEY SECTIONS ===";
const END_OF_CONTRACT_MARKER: &str = "=== END OF CONTRACT ===";

const HEAD_LINES: usize = 5;
const TAIL_LINES: usize = 3;
const LONG_LINE_CHARS: usize = 200;
const HEAD_PARAGRAPHS: usize = 3;
const TAIL_PARAGRAPHS: usize = 2;
const MAX_KEYWORD_SENTENCES: usize = 10;

static SECTION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:(?i:article|art\.|clause|chapter|chapitre|section|titre|title|annexe|annex)\s*(?:\d+|[IVXLC]+)\b|[IVXLC]+[.)]\s|\d+(?:\.\d+)*[.)]?\s+\p{Lu})",
    )
    .expect("section marker pattern compiles")
});

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").expect("paragraph pattern compiles"));

static LEGAL_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:obligations?|liabilit(?:y|ies)|responsabilités?|terminat(?:e|es|ed|ion|ions)|r[ée]siliations?|payments?|paiements?|prices?|prix|rents?|rental|loyers?|salary|salaries|salaires?|penalt(?:y|ies)|pénalités?|indemni(?:ty|ties|fy|fication|té|tés|sation)|warrant(?:y|ies)|guarantees?|garanties?|confidential(?:ity)?|confidentialité|durations?|durée|jurisdictions?|juridictions?|governing\s+law|disputes?|litiges?|breach(?:es)?|force\s+majeure|non-compete|non-concurrence)\b",
    )
    .expect("legal keyword pattern compiles")
});

/// Condense `text` so that it fits within `max_chars` characters.
///
/// Text already within budget is returned unchanged.
pub fn reduce(text: &str, max_chars: usize) -> ExtractedText {
    let text = text.trim();
    if char_len(text) <= max_chars {
        return ExtractedText::condensed(text.to_string());
    }

    let important = important_lines(text);
    if !important.is_empty() && char_len(&important) <= max_chars {
        tracing::debug!(
            original_chars = char_len(text),
            reduced_chars = char_len(&important),
            "Reduced document to important lines"
        );
        return ExtractedText::condensed(important);
    }

    let sectioned = key_sections(text);
    if !sectioned.is_empty() && char_len(&sectioned) <= max_chars {
        tracing::debug!(
            original_chars = char_len(text),
            reduced_chars = char_len(&sectioned),
            "Reduced document to key sections"
        );
        return ExtractedText::condensed(sectioned);
    }

    tracing::debug!(
        original_chars = char_len(text),
        max_chars,
        "Falling back to head/tail truncation"
    );
    ExtractedText::condensed(truncate_head_tail(text, max_chars))
}

fn important_lines(text: &str) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let tail_start = lines.len().saturating_sub(TAIL_LINES);

    lines
        .iter()
        .enumerate()
        .filter(|(index, line)| {
            *index < HEAD_LINES
                || *index >= tail_start
                || SECTION_MARKER.is_match(line)
                || contains_keyword(line)
                || char_len(line) > LONG_LINE_CHARS
        })
        .map(|(_, line)| *line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn key_sections(text: &str) -> String {
    let paragraphs: Vec<&str> = PARAGRAPH_BREAK
        .split(text)
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .collect();

    let head_end = paragraphs.len().min(HEAD_PARAGRAPHS);
    let tail_start = paragraphs.len().saturating_sub(TAIL_PARAGRAPHS).max(head_end);
    let head = &paragraphs[..head_end];
    let middle = &paragraphs[head_end..tail_start];
    let tail = &paragraphs[tail_start..];

    let keyword_sentences: Vec<&str> = middle
        .iter()
        .flat_map(|paragraph| sentences(paragraph))
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty() && contains_keyword(sentence))
        .take(MAX_KEYWORD_SENTENCES)
        .collect();

    let mut output = head.join("\n\n");
    if !keyword_sentences.is_empty() {
        output.push_str("\n\n");
        output.push_str(KEY_SECTIONS_MARKER);
        output.push('\n');
        output.push_str(&keyword_sentences.join("\n"));
    }
    if !tail.is_empty() {
        output.push_str("\n\n");
        output.push_str(END_OF_CONTRACT_MARKER);
        output.push('\n');
        output.push_str(&tail.join("\n\n"));
    }
    output
}

fn truncate_head_tail(text: &str, max_chars: usize) -> String {
    let separator = format!("\n\n{TRUNCATION_MARKER}\n\n");
    let keep = max_chars.saturating_sub(char_len(&separator)) / 2;
    let head: String = text.chars().take(keep).collect();
    let tail: String = {
        let total = char_len(text);
        text.chars().skip(total.saturating_sub(keep)).collect()
    };
    format!("{}{separator}{}", head.trim_end(), tail.trim_start())
}

fn contains_keyword(text: &str) -> bool {
    LEGAL_KEYWORD.is_match(text)
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
