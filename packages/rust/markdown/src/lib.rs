//! Document-to-Markdown conversion and cleanup passes.
//!
//! Lake and HTML bodies are rewritten into plain HTML by the [`lake`] renderer,
//! converted with `htmd`, then normalized by the cleanup pipeline. Markdown
//! bodies only go through the cleanup pipeline. A YAML frontmatter block is
//! prepended unless disabled.

mod cleanup;
mod lake;

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument, warn};
use url::Url;

use lakeexport_shared::{DocDetail, LakeExportError, Result};

/// Document formats that have no textual body to convert.
const UNSUPPORTED_FORMATS: &[&str] = &["lakesheet", "laketable", "lakeboard", "lakemind"];

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Result of converting a document to Markdown.
#[derive(Debug, Clone)]
pub struct ConvertResult {
    /// The final Markdown content (with frontmatter, if enabled).
    pub markdown: String,
    /// Explicit or extracted document title.
    pub title: String,
    /// Approximate word count of the Markdown body (excluding frontmatter).
    pub word_count: usize,
    /// Image URLs referenced by the document, in order of appearance.
    pub images: Vec<String>,
    /// Content that could not be converted and was skipped.
    pub warnings: Vec<String>,
}

/// Options for a single conversion.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Document URL, used for resolving relative links and in frontmatter.
    pub source_url: Option<String>,
    /// Override title (if `None`, extracted from first H1).
    pub title: Option<String>,
    /// RFC 3339 timestamp for the `updated_at` frontmatter field.
    pub updated_at: Option<String>,
    /// Prepend a YAML frontmatter block.
    pub frontmatter: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            source_url: None,
            title: None,
            updated_at: None,
            frontmatter: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Converters
// ---------------------------------------------------------------------------

/// Convert a Lake body to Markdown.
#[instrument(skip(source, opts), fields(len = source.len()))]
pub fn convert_lake(source: &str, opts: &ConvertOptions) -> Result<ConvertResult> {
    convert_markup(source, opts)
}

/// Convert an HTML body to Markdown.
///
/// HTML is a subset of what the Lake renderer accepts, so both share one path.
#[instrument(skip(html, opts), fields(len = html.len()))]
pub fn convert_html(html: &str, opts: &ConvertOptions) -> Result<ConvertResult> {
    convert_markup(html, opts)
}

/// Clean up a Markdown body.
#[instrument(skip(body, opts), fields(len = body.len()))]
pub fn convert_markdown(body: &str, opts: &ConvertOptions) -> Result<ConvertResult> {
    static IMAGE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\(([^)\s]+)").expect("valid regex"));

    let body = body.replace("\r\n", "\n");
    let images = IMAGE_RE
        .captures_iter(&body)
        .map(|c| c[1].to_string())
        .collect();

    Ok(finish(&body, opts, images, Vec::new()))
}

/// Convert a crawled document, choosing the richest body it carries.
///
/// Preference: `body_lake`, then `body` for Markdown documents, then
/// `body_html`, then any non-empty `body`.
#[instrument(skip_all, fields(slug = %doc.slug))]
pub fn convert_document(doc: &DocDetail, opts: &ConvertOptions) -> Result<ConvertResult> {
    let format = doc.format.as_deref().unwrap_or("lake");
    if UNSUPPORTED_FORMATS.contains(&format) {
        return Err(LakeExportError::Conversion(format!(
            "document '{}' has unsupported format '{format}'",
            doc.slug
        )));
    }

    let mut opts = opts.clone();
    if opts.title.is_none() && !doc.title.trim().is_empty() {
        opts.title = Some(doc.title.clone());
    }
    if opts.updated_at.is_none() {
        opts.updated_at = Some(doc.updated_at.to_rfc3339());
    }

    if let Some(lake) = non_empty(&doc.body_lake) {
        return convert_lake(lake, &opts);
    }
    if format == "markdown" {
        if let Some(body) = non_empty(&doc.body) {
            return convert_markdown(body, &opts);
        }
    }
    if let Some(html) = non_empty(&doc.body_html) {
        return convert_html(html, &opts);
    }
    if let Some(body) = non_empty(&doc.body) {
        return convert_markdown(body, &opts);
    }

    Err(LakeExportError::Conversion(format!(
        "document '{}' has no body to convert",
        doc.slug
    )))
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.trim().is_empty())
}

fn convert_markup(source: &str, opts: &ConvertOptions) -> Result<ConvertResult> {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "iframe", "noscript", "svg"])
        .build();

    let rendered = lake::render(source, &converter);
    let raw_markdown = converter
        .convert(&rendered.html)
        .map_err(|e| LakeExportError::Conversion(format!("htmd conversion failed: {e}")))?;
    let markdown = lake::restore_raw(&raw_markdown, &rendered.raw);

    debug!(
        raw_len = raw_markdown.len(),
        placeholders = rendered.raw.len(),
        "htmd conversion complete"
    );

    Ok(finish(&markdown, opts, rendered.images, rendered.warnings))
}

/// Cleanup, title, word count and frontmatter, shared by every format.
fn finish(
    markdown: &str,
    opts: &ConvertOptions,
    images: Vec<String>,
    warnings: Vec<String>,
) -> ConvertResult {
    let base_url = opts.source_url.as_deref().and_then(|u| Url::parse(u).ok());
    let cleaned = cleanup::run_pipeline(markdown, base_url.as_ref());

    let title = opts
        .title
        .clone()
        .or_else(|| extract_title_from_markdown(&cleaned))
        .unwrap_or_else(|| "Untitled".to_string());

    let word_count = count_words(&cleaned);

    let markdown = if opts.frontmatter {
        let frontmatter = build_frontmatter(&title, opts);
        format!("{frontmatter}\n{cleaned}")
    } else {
        cleaned
    };

    if !warnings.is_empty() {
        warn!(title = %title, count = warnings.len(), "converted with skipped content");
    }
    debug!(title = %title, word_count, final_len = markdown.len(), "conversion complete");

    ConvertResult {
        markdown,
        title,
        word_count,
        images,
        warnings,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Extract title from the first H1 in the Markdown text.
fn extract_title_from_markdown(md: &str) -> Option<String> {
    static H1_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^# (.+)$").expect("valid regex"));

    H1_RE.captures(md).map(|c| c[1].trim().to_string())
}

/// Count words in Markdown body (excluding fenced code).
fn count_words(md: &str) -> usize {
    static CODE_BLOCK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("valid regex"));

    let without_code = CODE_BLOCK_RE.replace_all(md, "");
    without_code
        .split_whitespace()
        .filter(|w| !w.starts_with('#') || w.len() > 2)
        .count()
}

/// Build a YAML frontmatter block.
fn build_frontmatter(title: &str, opts: &ConvertOptions) -> String {
    let mut fm = String::from("---\n");
    fm.push_str(&format!("title: \"{}\"\n", escape_yaml_string(title)));
    if let Some(url) = &opts.source_url {
        fm.push_str(&format!("source_url: \"{}\"\n", escape_yaml_string(url)));
    }
    if let Some(ts) = &opts.updated_at {
        fm.push_str(&format!("updated_at: \"{ts}\"\n"));
    }
    fm.push_str("---\n");
    fm
}

/// Escape special characters in a YAML string value.
fn escape_yaml_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
