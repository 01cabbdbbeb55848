//! Lake document rendering.
//!
//! A Lake body is HTML-like: an optional `<!doctype lake>`/`<meta>` prelude,
//! ordinary block and inline tags, flat `<ul>`/`<ol>` siblings whose nesting
//! lives in a `data-lake-indent` attribute, and `<card>` elements whose
//! `value` is `data:` followed by percent-encoded JSON.
//!
//! The renderer rewrites that into plain HTML for `htmd`. Anything `htmd`
//! would mangle (fenced code, math, tables, task markers, strikethrough) is
//! emitted as an opaque placeholder token and substituted back into the
//! Markdown afterwards by [`restore_raw`].

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html};
use serde_json::Value;
use tracing::warn;

/// Output of [`render`].
#[derive(Debug, Default)]
pub(crate) struct Rendered {
    /// Plain HTML with placeholder tokens.
    pub html: String,
    /// Markdown snippets, indexed by placeholder number.
    pub raw: Vec<String>,
    /// Image URLs referenced by the document.
    pub images: Vec<String>,
    /// Content that was skipped.
    pub warnings: Vec<String>,
}

/// Render a Lake (or plain HTML) body.
pub(crate) fn render(source: &str, converter: &htmd::HtmlToMarkdown) -> Rendered {
    let source = normalize_source(source);
    let fragment = Html::parse_fragment(&source);

    let mut renderer = Renderer {
        converter,
        raw: Vec::new(),
        images: Vec::new(),
        warnings: Vec::new(),
    };
    let mut html = String::new();
    renderer.render_children(fragment.root_element(), &mut html);

    Rendered {
        html,
        raw: renderer.raw,
        images: renderer.images,
        warnings: renderer.warnings,
    }
}

/// Substitute placeholder tokens with their Markdown.
///
/// Later placeholders can contain earlier ones (a table cell holding inline
/// math), so substitution runs from the highest index down.
///
/// A multi-line snippet inherits the container prefix of the line its token
/// sits on: `> ` inside a quote, or the marker width inside a list item.
pub(crate) fn restore_raw(markdown: &str, raw: &[String]) -> String {
    let mut result = markdown.to_string();
    for (i, snippet) in raw.iter().enumerate().rev() {
        let token = placeholder(i);
        if !snippet.contains('\n') {
            result = result.replace(&token, snippet);
            continue;
        }

        let mut restored = String::with_capacity(result.len() + snippet.len());
        let mut rest = result.as_str();
        while let Some(pos) = rest.find(&token) {
            restored.push_str(&rest[..pos]);
            let line_start = restored.rfind('\n').map_or(0, |n| n + 1);
            let continuation = continuation_prefix(&restored[line_start..]);
            push_prefixed(&mut restored, snippet, &continuation);
            rest = &rest[pos + token.len()..];
        }
        restored.push_str(rest);
        result = restored;
    }
    result
}

/// Prefix for the lines after the first, derived from the text before a
/// token. Quote markers are kept and list markers become spaces. Anything
/// else before the token means it is inline, and no prefix applies.
fn continuation_prefix(lead: &str) -> String {
    let container_only = lead.chars().all(|c| {
        c.is_whitespace() || c.is_ascii_digit() || matches!(c, '>' | '-' | '*' | '+' | '.' | ')')
    });
    if !container_only {
        return String::new();
    }
    lead.chars()
        .map(|c| if c == '>' || c.is_whitespace() { c } else { ' ' })
        .collect()
}

fn push_prefixed(out: &mut String, snippet: &str, prefix: &str) {
    for (n, line) in snippet.split('\n').enumerate() {
        if n > 0 {
            out.push('\n');
            if line.is_empty() {
                out.push_str(prefix.trim_end());
            } else {
                out.push_str(prefix);
            }
        }
        out.push_str(line);
    }
}

fn placeholder(index: usize) -> String {
    format!("LAKERAW{index}X")
}

/// Drop the doctype and make self-closing cards explicit.
fn normalize_source(source: &str) -> String {
    static DOCTYPE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)<!doctype[^>]*>").expect("valid regex"));
    static SELF_CLOSING_CARD_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<card([^>]*?)\s*/>").expect("valid regex"));

    let without_doctype = DOCTYPE_RE.replace_all(source, "");
    SELF_CLOSING_CARD_RE
        .replace_all(&without_doctype, "<card$1></card>")
        .into_owned()
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

struct Renderer<'c> {
    converter: &'c htmd::HtmlToMarkdown,
    raw: Vec<String>,
    images: Vec<String>,
    warnings: Vec<String>,
}

/// One nesting level of a rebuilt list.
struct ListBlock {
    ordered: bool,
    start: Option<u32>,
    items: Vec<ListItem>,
}

struct ListItem {
    html: String,
    children: Vec<ListBlock>,
}

impl Renderer<'_> {
    fn warn(&mut self, message: String) {
        warn!(%message, "skipping unsupported content");
        self.warnings.push(message);
    }

    fn push_raw(&mut self, markdown: String) -> String {
        self.raw.push(markdown);
        placeholder(self.raw.len() - 1)
    }

    fn push_raw_block(&mut self, markdown: String, out: &mut String) {
        let token = self.push_raw(markdown);
        out.push_str("<p>");
        out.push_str(&token);
        out.push_str("</p>");
    }

    fn render_children(&mut self, parent: ElementRef<'_>, out: &mut String) {
        let children: Vec<_> = parent.children().collect();
        let mut i = 0;

        while i < children.len() {
            let node = children[i];

            if let Some(el) = ElementRef::wrap(node) {
                if is_list(&el) {
                    // Gather the run of sibling lists; whitespace between them is ignored.
                    let mut run = vec![el];
                    let mut last = i;
                    let mut j = i + 1;
                    while j < children.len() {
                        let next = children[j];
                        if let Some(next_el) = ElementRef::wrap(next) {
                            if !is_list(&next_el) {
                                break;
                            }
                            run.push(next_el);
                            last = j;
                        } else if !next.value().as_text().is_some_and(|t| t.trim().is_empty()) {
                            break;
                        }
                        j += 1;
                    }
                    self.render_list_run(&run, out);
                    i = last + 1;
                    continue;
                }
                self.render_element(el, out);
            } else if let Some(text) = node.value().as_text() {
                out.push_str(&escape_text(text));
            }

            i += 1;
        }
    }

    fn render_element(&mut self, el: ElementRef<'_>, out: &mut String) {
        let name = el.value().name();
        match name {
            "meta" | "script" | "style" | "colgroup" | "col" | "template" => {}
            "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "blockquote" => {
                out.push_str(&format!("<{name}>"));
                self.render_children(el, out);
                out.push_str(&format!("</{name}>"));
            }
            "strong" | "b" => self.wrap_inline("strong", el, out),
            "em" | "i" => self.wrap_inline("em", el, out),
            "del" | "s" | "strike" => {
                let open = self.push_raw("~~".into());
                let close = self.push_raw("~~".into());
                out.push_str(&open);
                self.render_children(el, out);
                out.push_str(&close);
            }
            "code" => {
                let text: String = el.text().collect();
                out.push_str("<code>");
                out.push_str(&escape_text(&text));
                out.push_str("</code>");
            }
            "pre" => {
                let code: String = el.text().collect();
                let lang = pre_language(&el);
                self.push_raw_block(fenced(&lang, &code), out);
            }
            "a" => match el.value().attr("href") {
                Some(href) => {
                    out.push_str(&format!("<a href=\"{}\"", escape_attr(href)));
                    if let Some(title) = el.value().attr("title") {
                        out.push_str(&format!(" title=\"{}\"", escape_attr(title)));
                    }
                    out.push('>');
                    self.render_children(el, out);
                    out.push_str("</a>");
                }
                None => self.render_children(el, out),
            },
            "img" => match el.value().attr("src") {
                Some(src) => {
                    let alt = el.value().attr("alt").unwrap_or("");
                    self.push_image(src, alt, out);
                }
                None => self.warn("image without src".into()),
            },
            "br" => out.push_str("<br>"),
            "hr" => out.push_str("<hr>"),
            "table" => {
                let table = self.render_table(el);
                self.push_raw_block(table, out);
            }
            "card" => self.render_card(el, out),
            "ul" | "ol" => self.render_list_run(&[el], out),
            _ => self.render_children(el, out),
        }
    }

    fn wrap_inline(&mut self, tag: &str, el: ElementRef<'_>, out: &mut String) {
        out.push_str(&format!("<{tag}>"));
        self.render_children(el, out);
        out.push_str(&format!("</{tag}>"));
    }

    fn push_image(&mut self, src: &str, alt: &str, out: &mut String) {
        self.images.push(src.to_string());
        out.push_str(&format!(
            "<img src=\"{}\" alt=\"{}\">",
            escape_attr(src),
            escape_attr(alt)
        ));
    }

    // -- lists ---------------------------------------------------------------

    /// Rebuild nesting from a run of flat sibling lists.
    fn render_list_run(&mut self, lists: &[ElementRef<'_>], out: &mut String) {
        let mut roots: Vec<ListBlock> = Vec::new();

        for list in lists {
            let depth = list_indent(list);
            let ordered = list.value().name() == "ol";
            let start = list.value().attr("start").and_then(|s| s.parse().ok());

            let mut items = Vec::new();
            for li in list
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|c| c.value().name() == "li")
            {
                let mut html = String::new();
                self.render_children(li, &mut html);
                items.push(ListItem {
                    html,
                    children: Vec::new(),
                });
            }
            if items.is_empty() {
                continue;
            }

            insert_list(
                &mut roots,
                depth,
                ListBlock {
                    ordered,
                    start,
                    items,
                },
            );
        }

        for block in &roots {
            list_html(block, out);
        }
    }

    // -- tables --------------------------------------------------------------

    /// Markdown table; the first row is the header.
    fn render_table(&mut self, table: ElementRef<'_>) -> String {
        let mut rows: Vec<Vec<String>> = Vec::new();

        for tr in table
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|e| e.value().name() == "tr")
        {
            let cells: Vec<String> = tr
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|c| matches!(c.value().name(), "td" | "th"))
                .map(|cell| self.cell_markdown(cell))
                .collect();
            if !cells.is_empty() {
                rows.push(cells);
            }
        }

        let col_count = rows.iter().map(Vec::len).max().unwrap_or(0);
        if col_count == 0 {
            return String::new();
        }
        for row in &mut rows {
            row.resize(col_count, String::new());
        }

        let mut md = String::new();
        md.push_str(&format!("| {} |\n", rows[0].join(" | ")));
        md.push_str(&format!("| {} |", vec!["---"; col_count].join(" | ")));
        for row in &rows[1..] {
            md.push_str(&format!("\n| {} |", row.join(" | ")));
        }
        md
    }

    fn cell_markdown(&mut self, cell: ElementRef<'_>) -> String {
        let mut html = String::new();
        self.render_children(cell, &mut html);

        let md = match self.converter.convert(&html) {
            Ok(md) => md,
            Err(e) => {
                self.warn(format!("table cell conversion failed: {e}"));
                cell.text().collect()
            }
        };

        md.trim()
            .split('\n')
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("<br>")
            .replace('|', "\\|")
    }

    // -- cards ---------------------------------------------------------------

    fn render_card(&mut self, el: ElementRef<'_>, out: &mut String) {
        let name = el.value().attr("name").unwrap_or_default().to_string();
        let block = el.value().attr("type") == Some("block");

        let value = match decode_card_value(el.value().attr("value")) {
            Ok(value) => value,
            Err(e) => {
                self.warn(format!("card '{name}': {e}"));
                return;
            }
        };

        match name.as_str() {
            "image" => match str_field(&value, &["src", "url"]) {
                Some(src) => {
                    let alt = str_field(&value, &["title", "name"]).unwrap_or_default();
                    let mut html = String::new();
                    self.push_image(&src, &alt, &mut html);
                    push_maybe_block(block, &html, out);
                }
                None => self.warn("image card without src".into()),
            },
            "codeblock" => {
                let code = str_field(&value, &["code"]).unwrap_or_default();
                let mode = str_field(&value, &["mode"]).unwrap_or_default();
                self.push_raw_block(fenced(&code_language(&mode), &code), out);
            }
            "hr" => out.push_str("<hr>"),
            "math" => {
                let code = str_field(&value, &["code"]).unwrap_or_default();
                let code = code.trim();
                if block {
                    self.push_raw_block(format!("$$\n{code}\n$$"), out);
                } else {
                    let token = self.push_raw(format!("${code}$"));
                    out.push_str(&token);
                }
            }
            "checkbox" => {
                let checked = match &value {
                    Value::Bool(b) => *b,
                    Value::String(s) => s == "true",
                    _ => false,
                };
                let token = self.push_raw(if checked { "[x] " } else { "[ ] " }.into());
                out.push_str(&token);
            }
            "mermaid" | "puml" | "plantuml" | "diagram" | "flowchart2" | "textdiagram"
            | "graphviz" => match str_field(&value, &["code"]) {
                Some(code) => {
                    let lang = diagram_language(&name, &value);
                    self.push_raw_block(fenced(&lang, &code), out);
                }
                None => match str_field(&value, &["url", "src"]) {
                    Some(src) => {
                        let mut html = String::new();
                        self.push_image(&src, &name, &mut html);
                        push_maybe_block(block, &html, out);
                    }
                    None => self.warn(format!("diagram card '{name}' without code")),
                },
            },
            "table" => match str_field(&value, &["html"]) {
                Some(html) => {
                    let fragment = Html::parse_fragment(&html);
                    let table = fragment
                        .root_element()
                        .descendants()
                        .filter_map(ElementRef::wrap)
                        .find(|e| e.value().name() == "table");
                    match table {
                        Some(table) => {
                            let md = self.render_table(table);
                            self.push_raw_block(md, out);
                        }
                        None => self.warn("table card without a table".into()),
                    }
                }
                None => self.warn("table card without html".into()),
            },
            "mention" => {
                if let Some(who) = str_field(&value, &["name", "login"]) {
                    out.push_str(&escape_text(&format!("@{who}")));
                }
            }
            "label" => {
                if let Some(label) = str_field(&value, &["label", "text"]) {
                    out.push_str(&escape_text(&label));
                }
            }
            "emoji" => {
                if let Some(emoji) = str_field(&value, &["name"]) {
                    out.push_str(&escape_text(&format!(":{emoji}:")));
                }
            }
            "file" | "video" | "audio" | "attachment" | "yuque" | "yuqueinline" | "bookmarklink"
            | "bookmarkInline" | "localdoc" | "link" => match link_target(&value) {
                Some((href, text)) => push_maybe_block(block, &link_html(&href, &text), out),
                None => self.warn(format!("card '{name}' without a target")),
            },
            _ => {
                self.warn(format!("unsupported card '{name}'"));
                if let Some((href, text)) = link_target(&value) {
                    push_maybe_block(block, &link_html(&href, &text), out);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Lists
// ---------------------------------------------------------------------------

fn is_list(el: &ElementRef<'_>) -> bool {
    matches!(el.value().name(), "ul" | "ol")
}

fn list_indent(el: &ElementRef<'_>) -> usize {
    el.value()
        .attr("data-lake-indent")
        .or_else(|| el.value().attr("lake-indent"))
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

/// Attach `block` at `depth`, under the last item of the enclosing level.
/// Depths deeper than the current nesting are clamped.
fn insert_list(blocks: &mut Vec<ListBlock>, depth: usize, block: ListBlock) {
    if depth > 0 {
        if let Some(parent) = blocks.last_mut().and_then(|b| b.items.last_mut()) {
            insert_list(&mut parent.children, depth - 1, block);
            return;
        }
    }

    match blocks.last_mut() {
        Some(last) if last.ordered == block.ordered => last.items.extend(block.items),
        _ => blocks.push(block),
    }
}

fn list_html(block: &ListBlock, out: &mut String) {
    let tag = if block.ordered { "ol" } else { "ul" };
    match block.start {
        Some(start) if block.ordered && start != 1 => out.push_str(&format!("<ol start=\"{start}\">")),
        _ => out.push_str(&format!("<{tag}>")),
    }
    for item in &block.items {
        out.push_str("<li>");
        out.push_str(&item.html);
        for child in &item.children {
            list_html(child, out);
        }
        out.push_str("</li>");
    }
    out.push_str(&format!("</{tag}>"));
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

/// Decode `data:<percent-encoded JSON>`.
fn decode_card_value(raw: Option<&str>) -> Result<Value, String> {
    let Some(raw) = raw else {
        return Ok(Value::Null);
    };
    let payload = raw.strip_prefix("data:").unwrap_or(raw);
    if payload.is_empty() {
        return Ok(Value::Null);
    }

    let decoded = urlencoding::decode(payload).map_err(|e| format!("bad encoding: {e}"))?;
    serde_json::from_str(&decoded)
        .or_else(|_| serde_json::from_str(payload))
        .map_err(|e| format!("bad value: {e}"))
}

/// First non-empty string among `keys`.
fn str_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| value.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(String::from)
}

/// `(href, text)` for link-like cards.
fn link_target(value: &Value) -> Option<(String, String)> {
    let detail = value.get("detail").cloned().unwrap_or(Value::Null);
    let href = str_field(value, &["src", "url", "href"]).or_else(|| str_field(&detail, &["url"]))?;
    let text = str_field(&detail, &["title"])
        .or_else(|| str_field(value, &["title", "name", "text"]))
        .unwrap_or_else(|| href.clone());
    Some((href, text))
}

fn link_html(href: &str, text: &str) -> String {
    format!("<a href=\"{}\">{}</a>", escape_attr(href), escape_text(text))
}

fn push_maybe_block(block: bool, html: &str, out: &mut String) {
    if block {
        out.push_str("<p>");
        out.push_str(html);
        out.push_str("</p>");
    } else {
        out.push_str(html);
    }
}

fn code_language(mode: &str) -> String {
    match mode.trim().to_lowercase().as_str() {
        "" | "plain" | "text" | "plaintext" => String::new(),
        other => other.replace(' ', "-"),
    }
}

fn diagram_language(name: &str, value: &Value) -> String {
    match name {
        "mermaid" => "mermaid".into(),
        "puml" | "plantuml" => "plantuml".into(),
        "graphviz" => "dot".into(),
        _ => str_field(value, &["type"])
            .map(|t| code_language(&t))
            .unwrap_or_else(|| "text".into()),
    }
}

/// Language hint of a `<pre>` from `data-lang` or a `language-*` class.
fn pre_language(pre: &ElementRef<'_>) -> String {
    let code = pre
        .children()
        .filter_map(ElementRef::wrap)
        .find(|c| c.value().name() == "code");

    for el in std::iter::once(*pre).chain(code) {
        if let Some(lang) = el.value().attr("data-lang") {
            return code_language(lang);
        }
        for class in el.value().classes() {
            if let Some(lang) = class
                .strip_prefix("language-")
                .or_else(|| class.strip_prefix("lang-"))
            {
                return code_language(lang);
            }
        }
    }
    String::new()
}

/// Fence `code`, using a fence longer than any backtick run inside it.
fn fenced(lang: &str, code: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in code.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    let fence = "`".repeat((longest + 1).max(3));
    let code = code.trim_end_matches('\n');
    format!("{fence}{lang}\n{code}\n{fence}")
}

// ---------------------------------------------------------------------------
// Escaping
// ---------------------------------------------------------------------------

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\u{a0}', " ")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converter() -> htmd::HtmlToMarkdown {
        htmd::HtmlToMarkdown::builder().build()
    }

    fn card(name: &str, kind: &str, value: &str) -> String {
        format!(
            "<card type=\"{kind}\" name=\"{name}\" value=\"data:{}\"></card>",
            urlencoding::encode(value)
        )
    }

    #[test]
    fn card_values_decode() {
        let value = format!("data:{}", urlencoding::encode(r#"{"code":"x = 1","mode":"python"}"#));
        let decoded = decode_card_value(Some(&value)).unwrap();
        assert_eq!(decoded["mode"], "python");

        assert_eq!(decode_card_value(Some("data:true")).unwrap(), Value::Bool(true));
        assert_eq!(decode_card_value(None).unwrap(), Value::Null);
        assert!(decode_card_value(Some("data:%7Bbroken")).is_err());
    }

    #[test]
    fn fence_outgrows_backticks() {
        assert_eq!(fenced("rust", "fn main() {}\n"), "```rust\nfn main() {}\n```");
        assert!(fenced("md", "```\ninner\n```").starts_with("````md\n"));
    }

    #[test]
    fn flat_lists_are_nested_by_indent() {
        let lake = r#"<ul data-lake-indent="0"><li>Parent</li></ul><ul data-lake-indent="1"><li>Child</li></ul><ul data-lake-indent="0"><li>Sibling</li></ul>"#;
        let rendered = render(lake, &converter());
        assert_eq!(
            rendered.html,
            "<ul><li>Parent<ul><li>Child</li></ul></li><li>Sibling</li></ul>"
        );
    }

    #[test]
    fn indent_without_parent_is_clamped() {
        let lake = r#"<ol data-lake-indent="2"><li>Deep</li></ol>"#;
        let rendered = render(lake, &converter());
        assert_eq!(rendered.html, "<ol><li>Deep</li></ol>");
    }

    #[test]
    fn ordered_start_preserved() {
        let lake = r#"<ol start="3"><li>Third</li></ol>"#;
        assert_eq!(
            render(lake, &converter()).html,
            "<ol start=\"3\"><li>Third</li></ol>"
        );
    }

    #[test]
    fn codeblock_card_becomes_placeholder() {
        let lake = card("codeblock", "block", r#"{"mode":"rust","code":"let x = 1;"}"#);
        let rendered = render(&lake, &converter());
        assert_eq!(rendered.html, "<p>LAKERAW0X</p>");
        assert_eq!(rendered.raw, vec!["```rust\nlet x = 1;\n```".to_string()]);
    }

    #[test]
    fn image_card_collected() {
        let lake = format!(
            "<p>{}</p>",
            card("image", "inline", r#"{"src":"https://cdn.example.com/a.png","name":"a.png"}"#)
        );
        let rendered = render(&lake, &converter());
        assert_eq!(rendered.images, vec!["https://cdn.example.com/a.png"]);
        assert!(rendered.html.contains(r#"<img src="https://cdn.example.com/a.png" alt="a.png">"#));
    }

    #[test]
    fn unknown_and_broken_cards_warn() {
        let lake = format!(
            "{}<card name=\"math\" value=\"data:%7Bbad\"></card>",
            card("board", "block", r#"{"id":1}"#)
        );
        let rendered = render(&lake, &converter());
        assert_eq!(rendered.warnings.len(), 2);
        assert!(rendered.warnings[0].contains("board"));
    }

    #[test]
    fn nested_placeholders_restore() {
        let raw = vec!["$x$".to_string(), "| LAKERAW0X |".to_string()];
        assert_eq!(restore_raw("LAKERAW1X", &raw), "| $x$ |");
    }

    #[test]
    fn block_snippets_follow_quote_prefix() {
        let raw = vec!["```rust\nlet x = 1;\n\n```".to_string()];
        assert_eq!(
            restore_raw("Intro\n\n> LAKERAW0X\n\nEnd", &raw),
            "Intro\n\n> ```rust\n> let x = 1;\n>\n> ```\n\nEnd"
        );
    }

    #[test]
    fn block_snippets_indent_under_list_marker() {
        let raw = vec!["```\na\n```".to_string()];
        assert_eq!(restore_raw("-   LAKERAW0X", &raw), "-   ```\n    a\n    ```");
        assert_eq!(restore_raw("> 1. LAKERAW0X", &raw), "> 1. ```\n>    a\n>    ```");
    }

    #[test]
    fn inline_tokens_get_no_prefix() {
        let raw = vec!["$$\nx\n$$".to_string()];
        assert_eq!(restore_raw("see LAKERAW0X", &raw), "see $$\nx\n$$");
    }

    #[test]
    fn doctype_and_meta_dropped() {
        let lake = r#"<!doctype lake><meta name="doc-version" content="1" /><p>Hi &amp; bye</p>"#;
        assert_eq!(render(lake, &converter()).html, "<p>Hi &amp; bye</p>");
    }
}
