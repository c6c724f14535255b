//! `.docx` templates with `{{ placeholder }}` fields.
//!
//! Word often splits typed text over several runs (spell check, formatting,
//! revision marks), so placeholders are located on the concatenated text of
//! each paragraph. The rendered value goes into the run where the placeholder
//! starts and the remaining pieces are removed from the following runs.
//!
//! Paragraphs nest when a run holds a text box. Each paragraph owns only its
//! own `<w:t>` nodes; the text box paragraphs are separate units.

use crate::utils::error::{EtlError, Result};
use quick_xml::escape::{escape, unescape};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::ops::Range;
use std::sync::LazyLock;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::{CompressionMethod, ZipArchive};

const DOCUMENT_PART: &str = "word/document.xml";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("valid regex")
});
static TEMPLATED_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^word/(document|header\d*|footer\d*|footnotes|endnotes)\.xml$")
        .expect("valid regex")
});

struct Entry {
    name: String,
    is_dir: bool,
    data: Vec<u8>,
}

pub struct DocxTemplate {
    entries: Vec<Entry>,
}

impl DocxTemplate {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| EtlError::TemplateError {
            message: format!("not a .docx package: {}", e),
        })?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            entries.push(Entry {
                name: file.name().to_string(),
                is_dir: file.is_dir(),
                data,
            });
        }

        if !entries.iter().any(|e| e.name == DOCUMENT_PART) {
            return Err(EtlError::TemplateError {
                message: format!("package has no {}", DOCUMENT_PART),
            });
        }

        Ok(Self { entries })
    }

    fn templated_parts(&self) -> impl Iterator<Item = &Entry> {
        self.entries
            .iter()
            .filter(|e| !e.is_dir && TEMPLATED_PART.is_match(&e.name))
    }

    /// Placeholder names, outer paragraphs before the text boxes they hold.
    pub fn placeholders(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = Vec::new();
        for entry in self.templated_parts() {
            let xml = part_text(entry)?;
            for nodes in paragraphs(&entry.name, xml)? {
                let (text, _) = paragraph_text(xml, &nodes);
                for captures in PLACEHOLDER.captures_iter(&text) {
                    let name = captures[1].to_string();
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
        }
        Ok(names)
    }

    /// Render into a new `.docx` package. Unknown placeholders become empty.
    pub fn render(&self, context: &BTreeMap<String, String>) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for entry in &self.entries {
            if entry.is_dir {
                zip.add_directory(entry.name.as_str(), options)?;
                continue;
            }

            zip.start_file(entry.name.as_str(), options)?;
            if TEMPLATED_PART.is_match(&entry.name) {
                let rendered = render_part(&entry.name, part_text(entry)?, context)?;
                zip.write_all(rendered.as_bytes())?;
            } else {
                zip.write_all(&entry.data)?;
            }
        }

        Ok(zip.finish()?.into_inner())
    }
}

fn part_text(entry: &Entry) -> Result<&str> {
    std::str::from_utf8(&entry.data).map_err(|_| EtlError::TemplateError {
        message: format!("{} is not valid UTF-8", entry.name),
    })
}

/// A `<w:t>` element, as byte ranges into the part.
struct TextNode {
    element: Range<usize>,
    open_tag: Range<usize>,
    raw: Range<usize>,
}

/// Text nodes of every paragraph in document order. A nested paragraph is
/// its own entry and its nodes are not part of the enclosing paragraph.
fn paragraphs(part: &str, xml: &str) -> Result<Vec<Vec<TextNode>>> {
    let mut reader = Reader::from_str(xml);
    let mut units: Vec<Vec<TextNode>> = Vec::new();
    let mut open: Vec<usize> = Vec::new();
    let mut text_start: Option<(usize, usize)> = None;

    loop {
        let before = reader.buffer_position() as usize;
        let event = reader.read_event().map_err(|e| EtlError::TemplateError {
            message: format!("{} is not well-formed XML at byte {}: {}", part, before, e),
        })?;
        let after = reader.buffer_position() as usize;

        match event {
            Event::Start(tag) if tag.name().as_ref() == b"w:p" => {
                open.push(units.len());
                units.push(Vec::new());
            }
            Event::End(tag) if tag.name().as_ref() == b"w:p" => {
                open.pop();
            }
            Event::Start(tag) if tag.name().as_ref() == b"w:t" => {
                text_start = Some((before, after));
            }
            Event::End(tag) if tag.name().as_ref() == b"w:t" => {
                if let (Some((start, open_end)), Some(&unit)) = (text_start.take(), open.last()) {
                    units[unit].push(TextNode {
                        element: start..after,
                        open_tag: start..open_end,
                        raw: open_end..before,
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(units)
}

/// Concatenated paragraph text and each node's range within it.
fn paragraph_text(xml: &str, nodes: &[TextNode]) -> (String, Vec<Range<usize>>) {
    let mut text = String::new();
    let mut ranges = Vec::with_capacity(nodes.len());

    for node in nodes {
        let raw = &xml[node.raw.clone()];
        let decoded = unescape(raw)
            .map(|c| c.into_owned())
            .unwrap_or_else(|_| raw.to_string());
        let start = text.len();
        text.push_str(&decoded);
        ranges.push(start..text.len());
    }

    (text, ranges)
}

fn render_part(part: &str, xml: &str, context: &BTreeMap<String, String>) -> Result<String> {
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();
    for nodes in paragraphs(part, xml)? {
        edits.extend(render_paragraph(xml, &nodes, context));
    }
    if edits.is_empty() {
        return Ok(xml.to_string());
    }
    edits.sort_by_key(|(range, _)| range.start);

    let mut output = String::with_capacity(xml.len());
    let mut cursor = 0;
    for (range, replacement) in edits {
        output.push_str(&xml[cursor..range.start]);
        output.push_str(&replacement);
        cursor = range.end;
    }
    output.push_str(&xml[cursor..]);
    Ok(output)
}

/// Replacement `<w:t>` elements for the nodes of one paragraph whose text changes.
fn render_paragraph(
    xml: &str,
    nodes: &[TextNode],
    context: &BTreeMap<String, String>,
) -> Vec<(Range<usize>, String)> {
    let (text, ranges) = paragraph_text(xml, nodes);
    let placeholders: Vec<(Range<usize>, &str)> = PLACEHOLDER
        .captures_iter(&text)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let name = captures.get(1)?.as_str();
            let value = context.get(name).map(String::as_str).unwrap_or("");
            Some((whole.range(), value))
        })
        .collect();

    if placeholders.is_empty() {
        return Vec::new();
    }

    let mut edits = Vec::new();
    for (node, range) in nodes.iter().zip(&ranges) {
        let new_text = rewrite_node_text(&text, range, &placeholders);
        if new_text == text[range.clone()] {
            continue;
        }

        let open_tag = &xml[node.open_tag.clone()];
        let mut element = String::new();
        if open_tag.contains("xml:space") {
            element.push_str(open_tag);
        } else {
            element.push_str("<w:t xml:space=\"preserve\"");
            element.push_str(&open_tag[4..]);
        }
        element.push_str(&escape(new_text.as_str()));
        element.push_str("</w:t>");
        edits.push((node.element.clone(), element));
    }
    edits
}

/// Text of one node after substitution: a placeholder's value is written by
/// the node holding its first character; the other nodes drop their share.
fn rewrite_node_text(text: &str, node: &Range<usize>, placeholders: &[(Range<usize>, &str)]) -> String {
    let mut result = String::new();
    let mut position = node.start;

    for (range, value) in placeholders {
        if range.end <= node.start || range.start >= node.end {
            continue;
        }
        if range.start > position {
            result.push_str(&text[position..range.start]);
        }
        if range.start >= node.start {
            result.push_str(value);
        }
        position = position.max(range.end.min(node.end));
    }
    result.push_str(&text[position..node.end]);
    result
}
