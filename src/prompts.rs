//! System prompts for the remote enrichment calls.
//!
//! Every prompt the completion service sees lives here, so a behaviour
//! change is a one-file edit and tests can inspect the exact wording without
//! a live provider. The user prompts are assembled by the builder functions
//! at the bottom of this module.

/// System prompt for converting extracted text to Markdown.
pub const MARKDOWN_SYSTEM_PROMPT: &str = r#"You are an expert document converter. You receive the raw text layer extracted from a PDF together with a short structural description of the document. Convert it to clean, well-structured Markdown.

Follow these rules precisely:

1. TEXT PRESERVATION
   - Preserve ALL text content; do not summarise or omit passages
   - Keep the reading order of the source text
   - Re-join words and sentences broken across lines by the extraction

2. STRUCTURE
   - Use # for the document title (at most one)
   - Use ## for major sections and ### for subsections
   - Render label/value pairs as **Label:** value
   - Use - for unordered lists and 1. 2. 3. for ordered lists
   - Convert tabular text to GFM pipe tables

3. FORMS
   - Render empty fields as **Label:** followed by an empty value
   - Render checkboxes as - [ ] or - [x]

4. OUTPUT FORMAT
   - Output ONLY the Markdown content
   - Do NOT wrap the output in ```markdown fences
   - Do NOT add commentary or explanations"#;

/// System prompt for semantic analysis. The answer must be a JSON object.
pub const ANALYSIS_SYSTEM_PROMPT: &str = r#"You analyse documents. Reply with a single JSON object and nothing else, using exactly these keys:

{
  "document_type": one of "insurance", "invoice", "contract", "check", "general",
  "summary": a summary of at most two sentences,
  "key_points": up to 5 short strings with the most important facts (amounts, dates, identifiers),
  "topics": up to 5 lowercase topic keywords,
  "language": "es", "en" or "unknown"
}

Do not wrap the JSON in code fences."#;

/// System prompt for configured field extraction. The answer must be JSON.
pub const FIELD_EXTRACTION_SYSTEM_PROMPT: &str = r#"You extract structured data from documents. Follow the extraction instructions exactly and reply with a single JSON value shaped like the example. Use null for values that are not present in the document. Do not add commentary and do not wrap the JSON in code fences."#;

/// User prompt for the markdown call.
pub fn markdown_user_prompt(text: &str, description: &str, instructions: Option<&str>) -> String {
    let mut prompt = format!("Document: {description}\n\n");
    if let Some(extra) = instructions.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str("Additional instructions:\n");
        prompt.push_str(extra);
        prompt.push_str("\n\n");
    }
    prompt.push_str("Extracted text:\n\"\"\"\n");
    prompt.push_str(text);
    prompt.push_str("\n\"\"\"");
    prompt
}

/// User prompt for the analysis call.
pub fn analysis_user_prompt(text: &str) -> String {
    format!("Analyse the following document text:\n\"\"\"\n{text}\n\"\"\"")
}

/// User prompt for a configured field extraction.
pub fn field_extraction_user_prompt(text: &str, prompt: &str, example: &str) -> String {
    format!(
        "Instructions:\n{prompt}\n\nExample output:\n{example}\n\nDocument text:\n\"\"\"\n{text}\n\"\"\""
    )
}
