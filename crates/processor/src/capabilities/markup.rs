//! SVG minification.
//!
//! A conservative single-pass rewrite: comments and metadata blocks are
//! dropped and insignificant whitespace is removed. Whitespace that can
//! affect rendering is kept: text content is only collapsed, and
//! `xml:space="preserve"` subtrees, `<script>`/`<style>` bodies and CDATA
//! sections are copied verbatim.

use std::sync::LazyLock;

use bytes::Bytes;
use regex::Regex;

use crate::capability::{Capability, TransformContext};
use crate::error::JobError;

/// Extension of stored markup outputs.
pub const OUTPUT_EXTENSION: &str = "svg";

/// MIME type of stored markup outputs.
pub const OUTPUT_CONTENT_TYPE: &str = "image/svg+xml";

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static XML_SPACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\sxml:space\s*=\s*["'](preserve|default)["']"#).expect("valid regex")
});

/// How character data inside the current element is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Space {
    /// Structural content: whitespace-only runs are dropped.
    Strip,
    /// Text content: runs collapse to one space but are never dropped.
    Collapse,
    /// Copied as is.
    Preserve,
}

fn malformed(what: &str) -> JobError {
    JobError::InvalidInput(format!("malformed markup: {what}"))
}

/// Minify an SVG document. Input must contain an `<svg` element and be
/// well-formed enough to tokenize.
pub fn minify_svg(input: &str, out: &mut String) -> Result<(), JobError> {
    if !input.contains("<svg") {
        return Err(JobError::InvalidInput("payload is not an SVG document".into()));
    }

    out.clear();
    let mut open: Vec<Space> = Vec::new();
    let mut rest = input;

    while !rest.is_empty() {
        let mode = open.last().copied().unwrap_or(Space::Strip);
        let Some(lt) = rest.find('<') else {
            push_text(rest, mode, out);
            break;
        };
        push_text(&rest[..lt], mode, out);
        rest = &rest[lt..];

        if let Some(after) = rest.strip_prefix("<!--") {
            let end = after.find("-->").ok_or_else(|| malformed("unterminated comment"))?;
            rest = &after[end + 3..];
        } else if rest.starts_with("<![CDATA[") {
            rest = copy_through(rest, "]]>", out)
                .ok_or_else(|| malformed("unterminated CDATA"))?;
        } else if rest.starts_with("<?") {
            rest = copy_through(rest, "?>", out)
                .ok_or_else(|| malformed("unterminated processing instruction"))?;
        } else if rest.starts_with("<!") {
            rest = copy_through(rest, ">", out)
                .ok_or_else(|| malformed("unterminated declaration"))?;
        } else if let Some(after) = rest.strip_prefix("</") {
            let end = after.find('>').ok_or_else(|| malformed("unterminated end tag"))?;
            out.push_str("</");
            out.push_str(after[..end].trim());
            out.push('>');
            open.pop();
            rest = &after[end + 1..];
        } else {
            let end = tag_end(rest).ok_or_else(|| malformed("unterminated tag"))?;
            let tag = &rest[..=end];
            rest = &rest[end + 1..];
            let name = tag_name(tag);
            let self_closing = tag.ends_with("/>");

            if name == "metadata" && mode != Space::Preserve {
                if !self_closing {
                    rest = skip_element(rest, name).ok_or_else(|| malformed("unclosed metadata"))?;
                }
                continue;
            }

            if mode == Space::Preserve {
                out.push_str(tag);
            } else {
                push_tag(tag, out);
            }
            if self_closing {
                continue;
            }

            if name == "script" || name == "style" {
                let close = rest
                    .find(&format!("</{name}"))
                    .ok_or_else(|| malformed("unclosed script or style"))?;
                out.push_str(&rest[..close]);
                rest = &rest[close..];
                open.push(Space::Preserve);
                continue;
            }

            let next = match XML_SPACE.captures(tag).and_then(|c| c.get(1)) {
                Some(value) if value.as_str() == "preserve" => Space::Preserve,
                Some(_) if mode == Space::Strip && name != "text" => Space::Strip,
                Some(_) => Space::Collapse,
                None if mode != Space::Strip => mode,
                None if name == "text" => Space::Collapse,
                None => Space::Strip,
            };
            open.push(next);
        }
    }

    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    Ok(())
}

fn push_text(text: &str, mode: Space, out: &mut String) {
    match mode {
        Space::Preserve => out.push_str(text),
        Space::Collapse => out.push_str(&WHITESPACE_RUN.replace_all(text, " ")),
        Space::Strip if text.trim().is_empty() => {}
        Space::Strip => out.push_str(&WHITESPACE_RUN.replace_all(text, " ")),
    }
}

/// Copy `rest` up to and including `terminator`, returning what follows.
fn copy_through<'a>(rest: &'a str, terminator: &str, out: &mut String) -> Option<&'a str> {
    let end = rest.find(terminator)? + terminator.len();
    out.push_str(&rest[..end]);
    Some(&rest[end..])
}

/// Skip past the `</name>` closing the element whose start tag was just
/// consumed.
fn skip_element<'a>(rest: &'a str, name: &str) -> Option<&'a str> {
    let close = rest.find(&format!("</{name}"))?;
    let gt = rest[close..].find('>')? + close;
    Some(&rest[gt + 1..])
}

/// Index of the `>` ending the tag at the start of `rest`, ignoring any
/// inside quoted attribute values.
fn tag_end(rest: &str) -> Option<usize> {
    let mut quote = None;
    for (i, c) in rest.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Some(i),
            _ => {}
        }
    }
    None
}

fn tag_name(tag: &str) -> &str {
    let name = &tag[1..];
    let end = name
        .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .unwrap_or(name.len());
    &name[..end]
}

/// Write a start tag with whitespace between attributes collapsed.
/// Attribute values are copied unchanged.
fn push_tag(tag: &str, out: &mut String) {
    let mut quote = None;
    let mut pending_space = false;
    for c in tag.chars() {
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && c != '>' && c != '/' {
            out.push(' ');
        }
        pending_space = false;
        if c == '"' || c == '\'' {
            quote = Some(c);
        }
        out.push(c);
    }
}

/// Per-worker output string.
#[derive(Debug, Default)]
pub struct MarkupContext {
    buffer: String,
}

impl TransformContext for MarkupContext {
    fn reset(&mut self) {
        self.buffer.clear();
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupCapability;

impl Capability for MarkupCapability {
    type Options = ();
    type Context = MarkupContext;
    const KIND: &'static str = "markup";

    fn new_context(&self) -> MarkupContext {
        MarkupContext::default()
    }

    async fn transform(
        &self,
        payload: &Bytes,
        _options: Option<&()>,
        context: &mut MarkupContext,
    ) -> Result<Bytes, JobError> {
        let input = std::str::from_utf8(payload)
            .map_err(|e| JobError::InvalidInput(format!("markup is not UTF-8: {e}")))?;
        minify_svg(input, &mut context.buffer)?;
        Ok(Bytes::copy_from_slice(context.buffer.as_bytes()))
    }
}
