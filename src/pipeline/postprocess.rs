//! Post-processing: deterministic cleanup applied to every Markdown document.
//!
//! Both rendering paths end here. Completions tend to arrive wrapped in a
//! ` ```markdown ` fence, with `\r\n` line endings and with headings glued
//! to the previous paragraph. Text pulled out of a PDF text layer carries
//! soft hyphens, byte-order marks and zero-width joiners that the local
//! renderer copies through verbatim. One pass over the lines fixes all of
//! it, so the output shape is the same whichever path produced it.
//!
//! Content inside fenced code blocks keeps its blank lines and `#` lines.
//! The pass is idempotent: cleaning clean Markdown returns it unchanged.

use once_cell::sync::Lazy;
use regex::Regex;

/// Characters with no visible glyph that PDF text layers commonly carry.
const INVISIBLE_CHARS: [char; 6] = [
    '\u{200B}', // zero-width space
    '\u{200C}', // zero-width non-joiner
    '\u{200D}', // zero-width joiner
    '\u{2060}', // word joiner
    '\u{FEFF}', // byte-order mark
    '\u{00AD}', // soft hyphen
];

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?[ \t]*\n(.*)\n```$").unwrap());

/// Clean a rendered document.
///
/// Line endings become `\n`, an outer code fence around the whole document
/// is removed, invisible characters and trailing whitespace go, runs of
/// blank lines shrink to one, every ATX heading is preceded by a blank line
/// and the document ends with exactly one newline.
pub fn clean_markdown(input: &str) -> String {
    let normalised = input.replace("\r\n", "\n").replace('\r', "\n");
    let body = strip_outer_fence(normalised.trim());

    let mut out = String::with_capacity(body.len() + 1);
    let mut pending_blank = false;
    let mut in_code = false;

    for raw in body.lines() {
        let line = raw.replace(INVISIBLE_CHARS, "");
        let line = line.trim_end();

        if in_code {
            out.push('\n');
            out.push_str(line);
            if is_code_fence(line) {
                in_code = false;
            }
            continue;
        }

        if line.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }

        if !out.is_empty() {
            out.push('\n');
            if pending_blank || is_atx_heading(line) {
                out.push('\n');
            }
        }
        out.push_str(line);
        pending_blank = false;
        in_code = is_code_fence(line);
    }

    out.push('\n');
    out
}

fn strip_outer_fence(input: &str) -> &str {
    RE_OUTER_FENCE
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map_or(input, |m| m.as_str())
}

fn is_code_fence(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("```") || t.starts_with("~~~")
}

/// `#` to `######` followed by a space or the end of the line.
fn is_atx_heading(line: &str) -> bool {
    let hashes = line.bytes().take_while(|&b| b == b'#').count();
    (1..=6).contains(&hashes) && matches!(line.as_bytes().get(hashes), None | Some(b' '))
}
