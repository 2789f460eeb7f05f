//! Guideline PDF ingestion: text extraction and section-aware chunking.
//!
//! Text is pulled per page with `lopdf`, falling back to `pdf-extract` for
//! documents `lopdf` cannot read. Lines are grouped into sections using a
//! header heuristic (numbered headings, short all-caps lines, `✅` subsection
//! markers) and each section is split on its own, so a chunk never straddles
//! two sections.

use estate_core::{AppError, AppResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::OnceLock;
use text_splitter::{Characters, ChunkConfig, TextSplitter};

/// Label for text that precedes the first header.
pub const DEFAULT_SECTION: &str = "General";

const SUBSECTION_MARKER: char = '✅';
const MAX_HEADER_CHARS: usize = 60;
const MAX_LABEL_CHARS: usize = 80;

/// A piece of guideline text small enough to embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuidelineChunk {
    pub text: String,

    /// `"<section>"` or `"<section> > <subsection>"`
    pub section: String,

    /// Character offset of the chunk start in the whole document text
    pub offset: usize,

    /// 1-based page the chunk came from
    pub page: u32,

    /// Ordinal of the chunk within the document
    pub position: usize,
}

impl GuidelineChunk {
    /// Text used for embedding and prompt context.
    pub fn render(&self) -> String {
        format!(
            "From guidelines (Page {}, Section: {}):\n{}",
            self.page, self.section, self.text
        )
    }
}

/// Chunk size and overlap, both in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

impl ChunkingOptions {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> AppResult<Self> {
        let options = Self {
            chunk_size,
            chunk_overlap,
        };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_size == 0 {
            return Err(AppError::Config("chunk size must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    fn splitter(&self) -> AppResult<TextSplitter<Characters>> {
        self.validate()?;
        let config = ChunkConfig::new(self.chunk_size)
            .with_overlap(self.chunk_overlap)
            .map_err(|e| AppError::Config(format!("invalid chunking options: {}", e)))?;
        Ok(TextSplitter::new(config))
    }
}

/// A run of lines sharing one section label on one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub label: String,
    pub page: u32,

    /// Character offset of `text` in the whole document text
    pub offset: usize,

    pub text: String,
}

/// Extracted guideline text, already grouped into sections.
#[derive(Debug, Clone, Default)]
pub struct GuidelineDocument {
    sections: Vec<Section>,
    page_count: usize,
}

impl GuidelineDocument {
    /// Read and extract a PDF from disk.
    pub fn open(path: &Path) -> AppResult<Self> {
        let bytes = std::fs::read(path)?;
        tracing::debug!("Read {} bytes from {:?}", bytes.len(), path);
        Self::from_pdf_bytes(&bytes)
    }

    /// Extract a PDF held in memory.
    pub fn from_pdf_bytes(bytes: &[u8]) -> AppResult<Self> {
        let pages = extract_pages(bytes)?;
        Ok(Self::from_pages(pages))
    }

    /// Build from already-extracted page texts (page 1 first).
    ///
    /// Pages are joined with a single newline to form the document text that
    /// chunk offsets refer to.
    pub fn from_pages<S: AsRef<str>>(pages: impl IntoIterator<Item = S>) -> Self {
        let mut sections = Vec::new();
        let mut tracker = SectionTracker::default();
        let mut page_base = 0;
        let mut page_count = 0;

        for (index, page) in pages.into_iter().enumerate() {
            let page_text = page.as_ref();
            let page_number = index as u32 + 1;
            page_count += 1;

            let mut segment_start = 0;
            let mut cursor = 0;
            for line in page_text.split_inclusive('\n') {
                if let Some(header) = classify_line(line) {
                    push_section(
                        &mut sections,
                        &tracker,
                        page_number,
                        page_base,
                        page_text,
                        segment_start..cursor,
                    );
                    tracker.apply(header);
                    segment_start = cursor;
                }
                cursor += line.len();
            }
            push_section(
                &mut sections,
                &tracker,
                page_number,
                page_base,
                page_text,
                segment_start..page_text.len(),
            );

            // +1 for the joining newline
            page_base += page_text.chars().count() + 1;
        }

        tracing::debug!(
            "Guideline document has {} sections over {} pages",
            sections.len(),
            page_count
        );

        Self {
            sections,
            page_count,
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Lazily split every section into chunks.
    ///
    /// Each call starts over; the same document and options always yield
    /// the same chunks.
    pub fn chunks(&self, options: &ChunkingOptions) -> AppResult<GuidelineChunks<'_>> {
        Ok(GuidelineChunks {
            sections: self.sections.iter(),
            splitter: options.splitter()?,
            pending: VecDeque::new(),
            position: 0,
        })
    }
}

/// Iterator returned by [`GuidelineDocument::chunks`].
pub struct GuidelineChunks<'a> {
    sections: std::slice::Iter<'a, Section>,
    splitter: TextSplitter<Characters>,
    pending: VecDeque<GuidelineChunk>,
    position: usize,
}

impl Iterator for GuidelineChunks<'_> {
    type Item = GuidelineChunk;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(chunk) = self.pending.pop_front() {
                return Some(chunk);
            }

            let section = self.sections.next()?;
            for (byte_offset, text) in self.splitter.chunk_indices(&section.text) {
                if text.trim().is_empty() {
                    continue;
                }
                self.pending.push_back(GuidelineChunk {
                    text: text.to_string(),
                    section: section.label.clone(),
                    offset: section.offset + section.text[..byte_offset].chars().count(),
                    page: section.page,
                    position: self.position,
                });
                self.position += 1;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Header {
    Section(String),
    Subsection(String),
}

#[derive(Debug, Default)]
struct SectionTracker {
    section: Option<String>,
    subsection: Option<String>,
}

impl SectionTracker {
    fn apply(&mut self, header: Header) {
        match header {
            Header::Section(title) => {
                self.section = Some(title);
                self.subsection = None;
            }
            Header::Subsection(title) => self.subsection = Some(title),
        }
    }

    fn label(&self) -> String {
        let section = self.section.as_deref().unwrap_or(DEFAULT_SECTION);
        match &self.subsection {
            Some(sub) => format!("{} > {}", section, sub),
            None => section.to_string(),
        }
    }
}

fn push_section(
    sections: &mut Vec<Section>,
    tracker: &SectionTracker,
    page: u32,
    page_base: usize,
    page_text: &str,
    range: std::ops::Range<usize>,
) {
    let text = &page_text[range.clone()];
    if text.trim().is_empty() {
        return;
    }
    sections.push(Section {
        label: tracker.label(),
        page,
        offset: page_base + page_text[..range.start].chars().count(),
        text: text.to_string(),
    });
}

fn numbered_heading() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:section\s+\d+|\d{1,2}(?:\.\d{1,2})*\.?)(?:[\s:)\-]|$)").ok()
    })
    .as_ref()
}

fn classify_line(line: &str) -> Option<Header> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(rest) = trimmed.strip_prefix(SUBSECTION_MARKER) {
        let title = truncate_chars(rest.trim(), MAX_LABEL_CHARS);
        return (!title.is_empty()).then_some(Header::Subsection(title));
    }

    if trimmed.chars().count() > MAX_HEADER_CHARS || trimmed.ends_with('.') {
        return None;
    }

    let numbered = numbered_heading().is_some_and(|re| re.is_match(trimmed));
    if numbered || is_caps_heading(trimmed) {
        return Some(Header::Section(trimmed.to_string()));
    }

    None
}

fn is_caps_heading(line: &str) -> bool {
    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 3 && letters.iter().all(|c| c.is_uppercase())
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Page texts of a PDF.
///
/// Uses `lopdf` per page; when that fails or finds no text, falls back to
/// `pdf-extract` on the whole document as a single page.
pub fn extract_pages(bytes: &[u8]) -> AppResult<Vec<String>> {
    match lopdf::Document::load_mem(bytes) {
        Ok(doc) => {
            let mut pages = Vec::new();
            for (number, _) in doc.get_pages() {
                match doc.extract_text(&[number]) {
                    Ok(text) => pages.push(text),
                    Err(e) => {
                        tracing::warn!("Could not extract text from page {}: {}", number, e);
                        pages.push(String::new());
                    }
                }
            }

            if pages.iter().any(|p| !p.trim().is_empty()) {
                tracing::debug!("Extracted {} pages with lopdf", pages.len());
                return Ok(pages);
            }
            tracing::warn!("lopdf found no text, trying pdf-extract");
        }
        Err(e) => tracing::warn!("lopdf could not load PDF ({}), trying pdf-extract", e),
    }

    let text = extract_whole_document(bytes)?;
    if text.trim().is_empty() {
        return Err(AppError::Extraction(
            "PDF has no extractable text (image-only or encrypted?)".to_string(),
        ));
    }

    Ok(vec![text])
}

/// `pdf-extract` can panic on malformed fonts, so it runs on its own thread.
fn extract_whole_document(bytes: &[u8]) -> AppResult<String> {
    let data = bytes.to_vec();
    let handle = std::thread::spawn(move || {
        pdf_extract::extract_text_from_mem(&data).map_err(|e| e.to_string())
    });

    match handle.join() {
        Ok(Ok(text)) => Ok(text.replace('\0', "")),
        Ok(Err(e)) => Err(AppError::Extraction(format!("Failed to read PDF: {}", e))),
        Err(_) => Err(AppError::Extraction(
            "PDF text extraction crashed".to_string(),
        )),
    }
}
