//! Deterministic whitespace and control-character normalization.

/// Normalize extracted text.
///
/// Line endings become `\n`, form feeds become paragraph breaks, control and zero-width
/// characters are dropped, runs of horizontal whitespace collapse to one space, lines are
/// trimmed, and no more than one blank line survives between paragraphs.
pub fn clean_text(raw: &str) -> String {
    let normalized = raw
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\u{000C}', "\n\n");

    let mut output = String::with_capacity(normalized.len());
    let mut pending_blank = false;

    for line in normalized.split('\n') {
        let cleaned = clean_line(line);
        if cleaned.is_empty() {
            pending_blank = !output.is_empty();
            continue;
        }
        if !output.is_empty() {
            output.push('\n');
            if pending_blank {
                output.push('\n');
            }
        }
        pending_blank = false;
        output.push_str(&cleaned);
    }

    output
}

fn clean_line(line: &str) -> String {
    let mut cleaned = String::with_capacity(line.len());
    let mut last_was_space = true;

    for ch in line.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                cleaned.push(' ');
                last_was_space = true;
            }
        } else if ch.is_control() || is_invisible(ch) {
            continue;
        } else {
            cleaned.push(ch);
            last_was_space = false;
        }
    }

    if cleaned.ends_with(' ') {
        cleaned.pop();
    }
    cleaned
}

fn is_invisible(ch: char) -> bool {
    matches!(ch, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}')
}
