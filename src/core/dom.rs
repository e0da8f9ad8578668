//! Just enough HTML scanning to find one element by a simple selector and
//! swap out its inner markup.
//!
//! Supported selectors are a single compound: an optional tag name followed
//! by any number of `.class` and `#id` parts (`article.markdown-body`,
//! `#content`, `main.doc.wide`). Combinators are rejected.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("selector is empty")]
    Empty,
    #[error("unsupported character {0:?} in selector")]
    Unsupported(char),
    #[error("missing name after {0:?}")]
    MissingName(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        if input.is_empty() {
            return Err(SelectorError::Empty);
        }

        let mut selector = Selector {
            tag: None,
            id: None,
            classes: Vec::new(),
        };
        let mut chars = input.chars().peekable();

        let tag = take_ident(&mut chars);
        if !tag.is_empty() {
            selector.tag = Some(tag.to_ascii_lowercase());
        }

        while let Some(marker) = chars.next() {
            match marker {
                '.' | '#' => {
                    let name = take_ident(&mut chars);
                    if name.is_empty() {
                        return Err(SelectorError::MissingName(marker));
                    }
                    if marker == '.' {
                        selector.classes.push(name);
                    } else {
                        selector.id = Some(name);
                    }
                }
                other => return Err(SelectorError::Unsupported(other)),
            }
        }

        Ok(selector)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tag) = &self.tag {
            write!(f, "{tag}")?;
        }
        if let Some(id) = &self.id {
            write!(f, "#{id}")?;
        }
        for class in &self.classes {
            write!(f, ".{class}")?;
        }
        Ok(())
    }
}

fn take_ident(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut ident = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            ident.push(c);
            chars.next();
        } else {
            break;
        }
    }
    ident
}

impl Selector {
    fn matches(&self, tag: &StartTag) -> bool {
        if let Some(name) = &self.tag {
            if !tag.name.eq_ignore_ascii_case(name) {
                return false;
            }
        }

        if let Some(id) = &self.id {
            if tag.attr("id") != Some(id.as_str()) {
                return false;
            }
        }

        if !self.classes.is_empty() {
            let Some(class_attr) = tag.attr("class") else {
                return false;
            };
            let present: Vec<&str> = class_attr.split_whitespace().collect();
            if !self.classes.iter().all(|c| present.contains(&c.as_str())) {
                return false;
            }
        }

        true
    }
}

#[derive(Debug)]
struct StartTag {
    name: String,
    attrs: Vec<(String, String)>,
    end: usize,
    self_closing: bool,
}

impl StartTag {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn has_contents(&self) -> bool {
        !self.self_closing && !VOID_ELEMENTS.contains(&self.name.as_str())
    }
}

fn is_name_byte(b: u8) -> bool {
    !(b.is_ascii_whitespace() || b == b'>' || b == b'/' || b == b'=')
}

/// Parses a start tag beginning at `at` (which must point at `<`).
fn parse_start_tag(html: &str, at: usize) -> Option<StartTag> {
    let bytes = html.as_bytes();
    let mut i = at + 1;
    if !bytes.get(i)?.is_ascii_alphabetic() {
        return None;
    }

    let name_start = i;
    while i < bytes.len() && is_name_byte(bytes[i]) {
        i += 1;
    }
    let name = html[name_start..i].to_ascii_lowercase();

    let mut attrs = Vec::new();
    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match bytes.get(i)? {
            b'>' => {
                return Some(StartTag {
                    name,
                    attrs,
                    end: i + 1,
                    self_closing: false,
                });
            }
            b'/' if bytes.get(i + 1) == Some(&b'>') => {
                return Some(StartTag {
                    name,
                    attrs,
                    end: i + 2,
                    self_closing: true,
                });
            }
            b'/' => {
                i += 1;
                continue;
            }
            _ => {}
        }

        let key_start = i;
        while i < bytes.len() && is_name_byte(bytes[i]) {
            i += 1;
        }
        if i == key_start {
            // Stray `=` or similar; skip it so the loop always advances.
            i += 1;
            continue;
        }
        let key = html[key_start..i].to_string();

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }

        let mut value = String::new();
        if bytes.get(i) == Some(&b'=') {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            match bytes.get(i)? {
                quote @ (b'"' | b'\'') => {
                    let close = html[i + 1..].find(*quote as char)? + i + 1;
                    value = html[i + 1..close].to_string();
                    i = close + 1;
                }
                _ => {
                    let value_start = i;
                    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                        i += 1;
                    }
                    value = html[value_start..i].to_string();
                }
            }
        }

        attrs.push((key, value));
    }
}

fn skip_comment(html: &str, at: usize) -> Option<usize> {
    if html[at..].starts_with("<!--") {
        Some(html[at + 4..].find("-->").map_or(html.len(), |e| at + 4 + e + 3))
    } else {
        None
    }
}

/// Returns the name of an end tag starting at `at`, if there is one.
fn end_tag_name(html: &str, at: usize) -> Option<&str> {
    let rest = html[at..].strip_prefix("</")?;
    let len = rest.bytes().take_while(|b| is_name_byte(*b)).count();
    Some(&rest[..len])
}

/// Finds the `</name>` that closes an element whose contents begin at `from`.
fn find_matching_close(html: &str, name: &str, from: usize) -> Option<usize> {
    if RAW_TEXT_ELEMENTS.contains(&name) {
        let needle = format!("</{name}");
        let lower = html[from..].to_ascii_lowercase();
        return lower.find(&needle).map(|pos| from + pos);
    }

    let mut depth = 1usize;
    let mut i = from;
    while let Some(offset) = html[i..].find('<') {
        let at = i + offset;

        if let Some(next) = skip_comment(html, at) {
            i = next;
            continue;
        }

        if let Some(end_name) = end_tag_name(html, at) {
            if end_name.eq_ignore_ascii_case(name) {
                depth -= 1;
                if depth == 0 {
                    return Some(at);
                }
            }
            i = at + 2;
            continue;
        }

        if let Some(tag) = parse_start_tag(html, at) {
            if tag.name == name && tag.has_contents() {
                depth += 1;
            }
            i = tag.end;
            continue;
        }

        i = at + 1;
    }

    None
}

/// Locates the inner markup range of the first element matching `selector`.
pub fn find_contents(html: &str, selector: &Selector) -> Option<(usize, usize)> {
    let mut i = 0;
    while let Some(offset) = html[i..].find('<') {
        let at = i + offset;

        if let Some(next) = skip_comment(html, at) {
            i = next;
            continue;
        }

        let Some(tag) = parse_start_tag(html, at) else {
            i = at + 1;
            continue;
        };

        if selector.matches(&tag) {
            if !tag.has_contents() {
                return None;
            }
            let close = find_matching_close(html, &tag.name, tag.end)?;
            return Some((tag.end, close));
        }

        if RAW_TEXT_ELEMENTS.contains(&tag.name.as_str()) && !tag.self_closing {
            i = find_matching_close(html, &tag.name, tag.end)?;
            continue;
        }

        i = tag.end;
    }

    None
}

/// Returns a copy of `html` with the matched element's contents replaced by
/// `fragment`, or `None` when nothing matches.
pub fn replace_inner_html(html: &str, selector: &Selector, fragment: &str) -> Option<String> {
    let (start, end) = find_contents(html, selector)?;

    let mut out = String::with_capacity(html.len() - (end - start) + fragment.len());
    out.push_str(&html[..start]);
    out.push_str(fragment);
    out.push_str(&html[end..]);
    Some(out)
}

pub fn inner_html<'a>(html: &'a str, selector: &Selector) -> Option<&'a str> {
    find_contents(html, selector).map(|(start, end)| &html[start..end])
}
