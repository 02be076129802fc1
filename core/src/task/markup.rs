//! Inline directives embedded in task descriptions.
//!
//! Descriptions may contain `[[url|<href>]]`, `[[url|<href>|<label>]]` or
//! `[[styled|<style>|<text>]]`.
//! Front ends render them; the core only lexes them so that a malformed file
//! is rejected at load time. The description text itself is never rewritten.

use std::sync::OnceLock;

use regex::Regex;

/// A piece of a description after lexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Link { href: &'a str, label: Option<&'a str> },
    /// Emphasised text. Front ends that cannot style print `text` as is.
    Styled { style: &'a str, text: &'a str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupError {
    pub reason: String,
    pub offset: usize,
}

impl MarkupError {
    fn new(reason: impl Into<String>, offset: usize) -> Self {
        Self {
            reason: reason.into(),
            offset,
        }
    }
}

fn bracket_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\[|\]\]").expect("static regex"))
}

/// Split `text` into plain text and directives.
pub fn parse(text: &str) -> Result<Vec<Segment<'_>>, MarkupError> {
    let mut segments = Vec::new();
    let mut cursor = 0;
    let mut open: Option<usize> = None;

    for m in bracket_re().find_iter(text) {
        match (m.as_str(), open) {
            ("[[", None) => {
                if m.start() > cursor {
                    segments.push(Segment::Text(&text[cursor..m.start()]));
                }
                open = Some(m.start());
            }
            ("[[", Some(_)) => {
                return Err(MarkupError::new("nested '[[' inside a directive", m.start()));
            }
            ("]]", Some(start)) => {
                let body = &text[start + 2..m.start()];
                segments.push(parse_directive(body, start)?);
                cursor = m.end();
                open = None;
            }
            _ => {
                return Err(MarkupError::new("']]' without a matching '[['", m.start()));
            }
        }
    }

    if let Some(start) = open {
        return Err(MarkupError::new("unterminated directive", start));
    }
    if cursor < text.len() {
        segments.push(Segment::Text(&text[cursor..]));
    }
    Ok(segments)
}

/// Check `text` without keeping the segments.
pub fn validate(text: &str) -> Result<(), MarkupError> {
    parse(text).map(|_| ())
}

fn parse_directive(body: &str, offset: usize) -> Result<Segment<'_>, MarkupError> {
    let parts: Vec<&str> = body.split('|').collect();
    match parts.as_slice() {
        ["url", href] => Ok(Segment::Link {
            href: non_empty_href(href, offset)?,
            label: None,
        }),
        ["url", href, label] => Ok(Segment::Link {
            href: non_empty_href(href, offset)?,
            label: Some(label),
        }),
        ["url", ..] => Err(MarkupError::new(
            format!(
                "'url' takes an href and an optional label, found {} argument(s)",
                parts.len() - 1
            ),
            offset,
        )),
        ["styled", style, text] => {
            if style.trim().is_empty() {
                return Err(MarkupError::new("'styled' directive has an empty style", offset));
            }
            if text.is_empty() {
                return Err(MarkupError::new("'styled' directive has no text", offset));
            }
            Ok(Segment::Styled { style, text })
        }
        ["styled", ..] => Err(MarkupError::new(
            format!(
                "'styled' takes a style and a text, found {} argument(s)",
                parts.len() - 1
            ),
            offset,
        )),
        [kind, ..] => Err(MarkupError::new(
            format!("unknown directive '{}'", kind.trim()),
            offset,
        )),
        [] => Err(MarkupError::new("empty directive", offset)),
    }
}

fn non_empty_href(href: &str, offset: usize) -> Result<&str, MarkupError> {
    if href.trim().is_empty() {
        Err(MarkupError::new("'url' directive has an empty href", offset))
    } else {
        Ok(href)
    }
}
