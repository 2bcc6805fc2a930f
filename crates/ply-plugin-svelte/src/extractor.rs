//! Block extraction for Svelte components.
//!
//! Finds `<script>` and `<style>` blocks with memchr and returns borrowed
//! slices of the source; whatever is left over is the component markup.

use memchr::memmem;

/// Maximum component size accepted (10MB).
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Maximum number of `<script>`/`<style>` blocks in one component.
pub const MAX_BLOCKS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractorError {
    #[error("Component too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Too many <script>/<style> blocks: {count} (max: {max})")]
    TooManyBlocks { count: usize, max: usize },

    #[error("Unclosed <{tag}> tag")]
    UnclosedTag { tag: &'static str, position: usize },
}

impl ExtractorError {
    /// Byte offset of the problem in the component, when there is one.
    pub fn position(&self) -> Option<usize> {
        match self {
            ExtractorError::UnclosedTag { position, .. } => Some(*position),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Script,
    Style,
}

impl BlockKind {
    fn tag(self) -> &'static str {
        match self {
            BlockKind::Script => "script",
            BlockKind::Style => "style",
        }
    }
}

/// One `<script>` or `<style>` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<'a> {
    pub kind: BlockKind,
    pub content: &'a str,
    /// Offset of `content` in the component.
    pub content_start: usize,
    /// `<script context="module">` (or Svelte 5 `<script module>`).
    pub module_context: bool,
    pub lang: &'a str,
    /// Range of the whole block including its tags.
    tag_start: usize,
    tag_end: usize,
}

/// A component split into its blocks and markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentParts<'a> {
    pub blocks: Vec<Block<'a>>,
    /// Source with every block removed, trimmed.
    pub markup: String,
}

impl<'a> ComponentParts<'a> {
    pub fn scripts(&self) -> impl Iterator<Item = &Block<'a>> {
        self.blocks.iter().filter(|block| block.kind == BlockKind::Script)
    }

    pub fn styles(&self) -> impl Iterator<Item = &Block<'a>> {
        self.blocks.iter().filter(|block| block.kind == BlockKind::Style)
    }
}

/// Splits a component into script blocks, style blocks and markup.
pub fn extract(source: &str) -> Result<ComponentParts<'_>, ExtractorError> {
    if source.len() > MAX_FILE_SIZE {
        return Err(ExtractorError::FileTooLarge {
            size: source.len(),
            max: MAX_FILE_SIZE,
        });
    }

    let mut blocks = Vec::new();
    let mut pointer = 0;
    while let Some(block) = parse_block(source, &mut pointer)? {
        blocks.push(block);
        if blocks.len() > MAX_BLOCKS {
            return Err(ExtractorError::TooManyBlocks {
                count: blocks.len(),
                max: MAX_BLOCKS,
            });
        }
    }

    let mut markup = String::new();
    let mut cursor = 0;
    for block in &blocks {
        markup.push_str(&source[cursor..block.tag_start]);
        cursor = block.tag_end;
    }
    markup.push_str(&source[cursor..]);

    Ok(ComponentParts {
        blocks,
        markup: markup.trim().to_string(),
    })
}

fn parse_block<'a>(source: &'a str, pointer: &mut usize) -> Result<Option<Block<'a>>, ExtractorError> {
    let bytes = source.as_bytes();

    loop {
        let Some((tag_start, kind)) = find_next_open_tag(bytes, *pointer) else {
            return Ok(None);
        };
        let tag = kind.tag();
        *pointer = tag_start + 1 + tag.len();

        // `<scripts>` or `<styled-thing>` are not ours.
        if let Some(&next) = bytes.get(*pointer) {
            if !matches!(next, b' ' | b'\t' | b'\n' | b'\r' | b'>' | b'/') {
                continue;
            }
        }

        let Some(open_end) = find_closing_angle(bytes, *pointer) else {
            return Err(ExtractorError::UnclosedTag {
                tag,
                position: tag_start,
            });
        };
        let attributes = &source[*pointer..open_end];
        let module_context = attributes.contains("context=\"module\"")
            || attributes.contains("context='module'")
            || attributes.split_whitespace().any(|attr| attr.trim_end_matches('/') == "module");
        let lang = lang_attribute(attributes);

        if open_end > 0 && bytes[open_end - 1] == b'/' {
            *pointer = open_end + 1;
            return Ok(Some(Block {
                kind,
                content: "",
                content_start: open_end + 1,
                module_context,
                lang,
                tag_start,
                tag_end: open_end + 1,
            }));
        }

        let content_start = open_end + 1;
        let closing = format!("</{tag}>");
        let Some(content_end) = memmem::find(&bytes[content_start..], closing.as_bytes()).map(|pos| content_start + pos)
        else {
            return Err(ExtractorError::UnclosedTag {
                tag,
                position: tag_start,
            });
        };

        *pointer = content_end + closing.len();
        return Ok(Some(Block {
            kind,
            content: &source[content_start..content_end],
            content_start,
            module_context,
            lang,
            tag_start,
            tag_end: *pointer,
        }));
    }
}

/// The earliest `<script` or `<style` at or after `start`.
fn find_next_open_tag(bytes: &[u8], start: usize) -> Option<(usize, BlockKind)> {
    let rest = &bytes[start..];
    let script = memmem::find(rest, b"<script").map(|pos| (start + pos, BlockKind::Script));
    let style = memmem::find(rest, b"<style").map(|pos| (start + pos, BlockKind::Style));
    match (script, style) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (found, None) | (None, found) => found,
    }
}

/// Closing `>` of an opening tag, skipping quoted attribute values.
fn find_closing_angle(bytes: &[u8], start: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, &byte) in bytes[start..].iter().enumerate() {
        match (byte, quote) {
            (b'"' | b'\'', None) => quote = Some(byte),
            (b'"' | b'\'', Some(open)) if open == byte => quote = None,
            (b'>', None) => return Some(start + i),
            _ => {}
        }
    }
    None
}

/// Value of `lang=`, defaulting to `js`.
fn lang_attribute(attributes: &str) -> &str {
    let Some(index) = attributes.find("lang=") else {
        return "js";
    };
    let value = attributes[index + 5..].trim_start();
    match value.chars().next() {
        Some(quote @ ('"' | '\'')) => value[1..]
            .find(quote)
            .map_or("js", |end| &value[1..=end]),
        Some(_) => {
            let end = value
                .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
                .unwrap_or(value.len());
            if end == 0 { "js" } else { &value[..end] }
        }
        None => "js",
    }
}
