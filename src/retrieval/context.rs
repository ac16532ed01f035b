//! Rendering retrieved references into the system prompt.

use super::RetrievedDocument;

const CONTENT_PREVIEW_CHARS: usize = 1000;

const USAGE_INSTRUCTIONS: &str = "INSTRUCTIONS FOR USING THIS CONTEXT:
- Use these references to enrich the analysis
- Cite the relevant articles or clauses when applicable
- Compare the contract with the good practices identified
- Identify deviations from the standard templates";

/// Human label for a `document_type` payload value.
pub fn document_type_label(document_type: &str) -> &'static str {
    match document_type {
        "contract_template" => "Contract template",
        "law" => "Moroccan law",
        "regulation" => "Regulation",
        _ => "Document",
    }
}

/// Render retrieved documents as a reference-context block; empty input gives an empty block.
pub fn build_context(documents: &[RetrievedDocument]) -> String {
    if documents.is_empty() {
        return String::new();
    }

    let sections: Vec<String> = documents
        .iter()
        .enumerate()
        .map(|(index, document)| {
            let title = document
                .title
                .as_deref()
                .or(document.filename.as_deref())
                .unwrap_or("Untitled");
            let preview: String = document.content.chars().take(CONTENT_PREVIEW_CHARS).collect();
            let ellipsis = if document.content.chars().count() > CONTENT_PREVIEW_CHARS {
                "..."
            } else {
                ""
            };
            format!(
                "DOCUMENT {} - {} (similarity: {:.1}%)\nTitle: {title}\nRelevant content:\n{preview}{ellipsis}",
                index + 1,
                document_type_label(&document.document_type),
                document.similarity * 100.0,
            )
        })
        .collect();

    format!(
        "RELEVANT MOROCCAN LEGAL CONTEXT:\n{}\n\n{USAGE_INSTRUCTIONS}",
        sections.join("\n---\n")
    )
}

/// Insert `context` before the first occurrence of `anchor`, or append it when absent.
pub fn inject_context(system_prompt: &str, context: &str, anchor: &str) -> String {
    if context.trim().is_empty() {
        return system_prompt.to_string();
    }

    let position = if anchor.is_empty() {
        None
    } else {
        system_prompt.find(anchor)
    };
    match position {
        Some(position) => format!(
            "{}{context}\n\n{}",
            &system_prompt[..position],
            &system_prompt[position..]
        ),
        None => format!("{system_prompt}\n\n{context}"),
    }
}
