use once_cell::sync::Lazy;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use regex::Regex;

/// Characters escaped when a file id is spliced into a link path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'\'')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'%');

static VALUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"value='([^']+)'").expect("valid value pattern"));
static FILE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"file_id='([^']+)'").expect("valid file_id pattern"));
static CITATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"【\d+:\d+†source】").expect("valid citation pattern"));

/// One run of formatter output: either literal text or a citation link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Citation { label: String, href: String },
}

/// Formatter output as a structured sequence, so callers render text through
/// safe text nodes and citations through real anchor elements instead of
/// injecting raw markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formatted {
    pub segments: Vec<Segment>,
}

impl Formatted {
    /// HTML rendering used by the page template. Text runs are escaped;
    /// citations become anchors that open in a new tab.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(&escape_html(text)),
                Segment::Citation { label, href } => {
                    out.push_str("<a href=\"");
                    out.push_str(&escape_html(href));
                    out.push_str(
                        "\" target=\"_blank\" rel=\"noopener noreferrer\" class=\"text-blue-600 underline\">",
                    );
                    out.push_str(&escape_html(label));
                    out.push_str("</a>");
                }
            }
        }
        out
    }

    /// Terminal rendering: citation labels keep their marker text, with the
    /// link target appended in parentheses.
    pub fn to_plain(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Citation { label, href } => {
                    out.push_str(label);
                    out.push_str(" (");
                    out.push_str(href);
                    out.push(')');
                }
            }
        }
        out
    }
}

/// Turns a raw backend payload into display segments.
///
/// The backend sometimes hands back the textual repr of a serialized object,
/// e.g. `Text(annotations=[...], value='actual answer', ...)`. The first
/// single-quoted `value='…'` capture is used as the working text when
/// present; this is best-effort pattern extraction, not a parser for that
/// representation. When the raw payload also carries a `file_id='…'`, every
/// `【n:m†source】` citation marker in the working text is turned into a link
/// to `/api/files/<file_id>`; all markers share the one file id. Without a
/// file id, markers are left inline unchanged.
///
/// Total for any input: no matches yield a single text segment.
pub fn format_response(raw: &str) -> Formatted {
    let working = VALUE_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw);

    let file_id = FILE_ID_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str());

    let Some(file_id) = file_id else {
        return Formatted {
            segments: vec![Segment::Text(working.to_string())],
        };
    };

    let href = file_href(file_id);
    let mut segments = Vec::new();
    let mut cursor = 0;
    for found in CITATION_RE.find_iter(working) {
        if found.start() > cursor {
            segments.push(Segment::Text(working[cursor..found.start()].to_string()));
        }
        segments.push(Segment::Citation {
            label: found.as_str().to_string(),
            href: href.clone(),
        });
        cursor = found.end();
    }
    if cursor < working.len() || segments.is_empty() {
        segments.push(Segment::Text(working[cursor..].to_string()));
    }
    Formatted { segments }
}

fn file_href(file_id: &str) -> String {
    format!(
        "/api/files/{}",
        utf8_percent_encode(file_id, PATH_SEGMENT)
    )
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
