//! Best-effort PDF text extraction.
//!
//! `ContentStream` is a stopgap scanner: it walks the raw bytes for
//! `BT` ... `ET` text objects and collects the literal `(...)` operands of the
//! text-show operators (`Tj`, `TJ`, `'`, `"`), one output line per text
//! object. No font/encoding tables, no hex strings, and no Flate decoding, so
//! it is only reliable for uncompressed, simply-encoded content streams.
//! `Library` delegates to `pdf-extract`, which handles compressed streams.
//!
//! Extraction never fails: whatever could be recovered is returned, possibly
//! an empty string, and the parser reports the empty result.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::parsers::ddmm_statement::has_date_prefixed_line;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Extractor {
    /// Content-stream scan first, `pdf-extract` when it yields no dated line.
    #[default]
    Auto,
    ContentStream,
    Library,
}

impl FromStr for Extractor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Extractor::Auto),
            "content-stream" | "content_stream" | "bespoke" => Ok(Extractor::ContentStream),
            "library" | "pdf-extract" => Ok(Extractor::Library),
            other => Err(format!("unknown extractor '{other}' (auto | content-stream | library)")),
        }
    }
}

impl Extractor {
    pub fn extract(self, pdf: &[u8]) -> String {
        match self {
            Extractor::ContentStream => extract_content_stream_text(pdf),
            Extractor::Library => extract_with_library(pdf),
            Extractor::Auto => {
                let text = extract_content_stream_text(pdf);
                if has_date_prefixed_line(&text) {
                    return text;
                }
                debug!("content-stream scan found no dated lines; falling back to pdf-extract");
                let fallback = extract_with_library(pdf);
                if fallback.trim().is_empty() { text } else { fallback }
            }
        }
    }
}

fn extract_with_library(pdf: &[u8]) -> String {
    match pdf_extract::extract_text_from_mem(pdf) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "pdf-extract could not read document");
            String::new()
        }
    }
}

fn is_pdf_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x0c | 0x00)
}

fn is_pdf_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

/// Scan raw PDF bytes for text objects. Bytes are decoded as Latin-1.
pub fn extract_content_stream_text(pdf: &[u8]) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut in_text = false;
    // Segments of the current text object, one per show operator.
    let mut segments: Vec<String> = Vec::new();
    // Literal operands seen since the last operator.
    let mut pending: Vec<String> = Vec::new();

    let mut i = 0;
    while i < pdf.len() {
        let b = pdf[i];

        if is_pdf_whitespace(b) {
            i += 1;
            continue;
        }

        if b == b'(' {
            let (literal, next) = read_literal(pdf, i + 1);
            if in_text {
                pending.push(literal);
            }
            i = next;
            continue;
        }

        if b == b'%' && !in_text {
            // comment to end of line
            while i < pdf.len() && pdf[i] != b'\n' && pdf[i] != b'\r' {
                i += 1;
            }
            continue;
        }

        if is_pdf_delimiter(b) {
            i += 1;
            continue;
        }

        // Regular token: operator, number or keyword.
        let start = i;
        while i < pdf.len() && !is_pdf_whitespace(pdf[i]) && !is_pdf_delimiter(pdf[i]) {
            i += 1;
        }
        let token = &pdf[start..i];

        match token {
            b"BT" => {
                in_text = true;
                segments.clear();
                pending.clear();
            }
            b"ET" if in_text => {
                let line = segments.join(" ");
                if !line.trim().is_empty() {
                    lines.push(line.trim().to_string());
                }
                in_text = false;
                segments.clear();
                pending.clear();
            }
            b"Tj" | b"'" | b"\"" if in_text => {
                if !pending.is_empty() {
                    segments.push(pending.join(" "));
                }
                pending.clear();
            }
            b"TJ" if in_text => {
                // Array pieces are one string split for kerning.
                if !pending.is_empty() {
                    segments.push(pending.concat());
                }
                pending.clear();
            }
            _ if in_text && token.first().is_some_and(|c| c.is_ascii_alphabetic() || *c == b'\'' || *c == b'"') => {
                // Any other operator discards stray operands.
                pending.clear();
            }
            _ => {}
        }
    }

    let mut out = lines.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Read a literal string starting just after its opening `(`.
/// Returns the decoded text and the index after the closing `)`.
fn read_literal(pdf: &[u8], mut i: usize) -> (String, usize) {
    let mut out = String::new();
    let mut depth = 1usize;

    while i < pdf.len() {
        let b = pdf[i];
        match b {
            b'\\' => {
                i += 1;
                let Some(&esc) = pdf.get(i) else { break };
                match esc {
                    b'n' => out.push('\n'),
                    b'r' => out.push('\r'),
                    b't' => out.push('\t'),
                    b'b' => out.push('\u{8}'),
                    b'f' => out.push('\u{c}'),
                    b'(' | b')' | b'\\' => out.push(esc as char),
                    b'\r' => {
                        // line continuation
                        if pdf.get(i + 1) == Some(&b'\n') {
                            i += 1;
                        }
                    }
                    b'\n' => {}
                    b'0'..=b'7' => {
                        let mut value: u32 = 0;
                        let mut n = 0;
                        while n < 3 {
                            match pdf.get(i) {
                                Some(d @ b'0'..=b'7') => {
                                    value = value * 8 + u32::from(d - b'0');
                                    i += 1;
                                    n += 1;
                                }
                                _ => break,
                            }
                        }
                        out.push(char::from((value & 0xff) as u8));
                        continue;
                    }
                    other => out.push(other as char),
                }
                i += 1;
            }
            b'(' => {
                depth += 1;
                out.push('(');
                i += 1;
            }
            b')' => {
                depth -= 1;
                i += 1;
                if depth == 0 {
                    return (out, i);
                }
                out.push(')');
            }
            other => {
                out.push(char::from(other));
                i += 1;
            }
        }
    }

    (out, i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf_with_stream(content: &str) -> Vec<u8> {
        format!(
            "%PDF-1.4\n1 0 obj << /Length {} >>\nstream\n{}\nendstream\nendobj\n%%EOF\n",
            content.len(),
            content
        )
        .into_bytes()
    }

    #[test]
    fn one_line_per_text_object() {
        let pdf = pdf_with_stream(
            "BT /F1 10 Tf 50 700 Td (PERIODE : NOVEMBER 2025) Tj ET\n\
             BT 50 680 Td (05/11) Tj (TRANSFER OUT) Tj ET",
        );
        let text = extract_content_stream_text(&pdf);
        assert_eq!(text, "PERIODE : NOVEMBER 2025\n05/11 TRANSFER OUT\n");
    }

    #[test]
    fn tj_arrays_are_joined_without_kerning_gaps() {
        let pdf = pdf_with_stream("BT [(SAL) -20 (DO AWAL)] TJ (1,000,000.00) Tj ET");
        let text = extract_content_stream_text(&pdf);
        assert_eq!(text.trim(), "SALDO AWAL 1,000,000.00");
    }

    #[test]
    fn escapes_and_nested_parens_are_decoded() {
        let pdf = pdf_with_stream(r"BT (A \(B\) C\\D \101 (x)) Tj ET");
        let text = extract_content_stream_text(&pdf);
        assert_eq!(text.trim(), r"A (B) C\D A (x)");
    }

    #[test]
    fn text_outside_text_objects_is_ignored() {
        let pdf = pdf_with_stream("(Not shown) Tj BT (shown) Tj ET");
        assert_eq!(extract_content_stream_text(&pdf).trim(), "shown");
    }

    #[test]
    fn garbage_yields_empty_text_without_panicking() {
        assert_eq!(extract_content_stream_text(b""), "");
        assert_eq!(extract_content_stream_text(b"\x00\xff BT (unterminated"), "");
        assert_eq!(Extractor::ContentStream.extract(b"not a pdf"), "");
    }

    #[test]
    fn extractor_names_parse() {
        assert_eq!("auto".parse::<Extractor>().unwrap(), Extractor::Auto);
        assert_eq!("content-stream".parse::<Extractor>().unwrap(), Extractor::ContentStream);
        assert_eq!("library".parse::<Extractor>().unwrap(), Extractor::Library);
        assert!("ocr".parse::<Extractor>().is_err());
    }
}
