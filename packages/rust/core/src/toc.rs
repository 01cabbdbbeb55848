//! Repo catalog (`toc.yaml`) handling.
//!
//! The catalog is a flat YAML list of nodes linked by `uuid`/`parent_uuid`.
//! It decides where each converted document lands on disk and the order of
//! the per-repo `README.md` index.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use serde_yaml::Value;
use tracing::{debug, instrument, warn};

use lakeexport_shared::{LakeExportError, Result};

/// Kind of a catalog node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A document; `target` is its slug.
    Doc,
    /// A grouping heading without a document.
    Title,
    /// An external link; `target` is its URL.
    Link,
}

/// One entry of the catalog tree.
#[derive(Debug, Clone)]
pub struct CatalogNode {
    pub kind: NodeKind,
    pub title: String,
    pub target: String,
    pub children: Vec<CatalogNode>,
}

/// Hierarchical catalog of a repo.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub roots: Vec<CatalogNode>,
}

/// Flat node as read from YAML, before linking.
struct RawNode {
    kind: NodeKind,
    title: String,
    target: String,
    uuid: String,
    parent_uuid: String,
}

impl Catalog {
    /// Parse `toc.yaml`. `META` nodes and unknown node types are skipped.
    #[instrument(skip_all, fields(len = yaml.len()))]
    pub fn parse(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let items: Vec<Value> = serde_yaml::from_str(yaml)
            .map_err(|e| LakeExportError::parse(format!("invalid catalog: {e}")))?;

        let mut nodes = Vec::new();
        for item in &items {
            let kind = match scalar(item, "type").to_uppercase().as_str() {
                "DOC" => NodeKind::Doc,
                "TITLE" => NodeKind::Title,
                "LINK" => NodeKind::Link,
                "META" => continue,
                other => {
                    warn!(kind = other, "skipping unknown catalog node");
                    continue;
                }
            };
            nodes.push(RawNode {
                kind,
                title: scalar(item, "title"),
                target: scalar(item, "url"),
                uuid: scalar(item, "uuid"),
                parent_uuid: scalar(item, "parent_uuid"),
            });
        }

        let catalog = Self {
            roots: link_nodes(nodes),
        };
        debug!(roots = catalog.roots.len(), "catalog parsed");
        Ok(catalog)
    }

    /// Relative directory of every catalogued document, keyed by slug.
    ///
    /// Each ancestor's title becomes one directory level. The first
    /// occurrence wins for a slug listed twice.
    pub fn doc_dirs(&self) -> HashMap<String, PathBuf> {
        fn walk(nodes: &[CatalogNode], dir: &PathBuf, out: &mut HashMap<String, PathBuf>) {
            for node in nodes {
                if node.kind == NodeKind::Doc && !node.target.is_empty() {
                    out.entry(node.target.clone()).or_insert_with(|| dir.clone());
                }
                if !node.children.is_empty() {
                    walk(&node.children, &dir.join(sanitize_dir_name(&node.title)), out);
                }
            }
        }

        let mut out = HashMap::new();
        walk(&self.roots, &PathBuf::new(), &mut out);
        out
    }

    /// Render the repo `README.md`.
    ///
    /// `docs` lists every built document as `(slug, title)`; `paths` maps a
    /// slug to its output path relative to the repo directory. Documents the
    /// catalog does not mention are appended in `docs` order.
    pub fn render_index(
        &self,
        repo_name: &str,
        docs: &[(String, String)],
        paths: &HashMap<String, String>,
    ) -> String {
        let mut md = format!("# {repo_name}\n\n");
        let mut listed = HashSet::new();

        render_nodes(&self.roots, 0, paths, &mut listed, &mut md);

        let rest: Vec<_> = docs
            .iter()
            .filter(|(slug, _)| !listed.contains(slug.as_str()))
            .collect();
        if !rest.is_empty() {
            if !self.roots.is_empty() {
                md.push_str("\n## Other documents\n\n");
            }
            for (slug, title) in rest {
                if let Some(path) = paths.get(slug) {
                    md.push_str(&format!("- [{}]({})\n", link_text(title), link_path(path)));
                }
            }
        }

        md
    }
}

fn render_nodes<'a>(
    nodes: &'a [CatalogNode],
    depth: usize,
    paths: &HashMap<String, String>,
    listed: &mut HashSet<&'a str>,
    md: &mut String,
) {
    let indent = "  ".repeat(depth);
    for node in nodes {
        let title = link_text(&node.title);
        let line = match node.kind {
            NodeKind::Doc => match paths.get(&node.target) {
                Some(path) => {
                    listed.insert(node.target.as_str());
                    format!("[{title}]({})", link_path(path))
                }
                None => title,
            },
            NodeKind::Link if !node.target.is_empty() => format!("[{title}]({})", node.target),
            NodeKind::Link | NodeKind::Title => title,
        };
        md.push_str(&format!("{indent}- {line}\n"));
        render_nodes(&node.children, depth + 1, paths, listed, md);
    }
}

/// Build the tree from `parent_uuid` links, keeping list order.
/// Nodes whose parent is unknown become roots.
fn link_nodes(nodes: Vec<RawNode>) -> Vec<CatalogNode> {
    let known: HashSet<&str> = nodes.iter().map(|n| n.uuid.as_str()).collect();
    let mut children_of: HashMap<String, Vec<usize>> = HashMap::new();
    let mut roots = Vec::new();

    for (i, node) in nodes.iter().enumerate() {
        if node.parent_uuid.is_empty()
            || node.parent_uuid == node.uuid
            || !known.contains(node.parent_uuid.as_str())
        {
            roots.push(i);
        } else {
            children_of
                .entry(node.parent_uuid.clone())
                .or_default()
                .push(i);
        }
    }

    let mut visited = HashSet::new();
    roots
        .into_iter()
        .filter_map(|i| build_node(i, &nodes, &children_of, &mut visited))
        .collect()
}

fn build_node(
    index: usize,
    nodes: &[RawNode],
    children_of: &HashMap<String, Vec<usize>>,
    visited: &mut HashSet<usize>,
) -> Option<CatalogNode> {
    // Guards against parent cycles in malformed catalogs.
    if !visited.insert(index) {
        return None;
    }
    let raw = &nodes[index];
    let children = children_of
        .get(&raw.uuid)
        .map(|indices| {
            indices
                .iter()
                .filter_map(|&i| build_node(i, nodes, children_of, visited))
                .collect()
        })
        .unwrap_or_default();

    Some(CatalogNode {
        kind: raw.kind,
        title: raw.title.clone(),
        target: raw.target.clone(),
        children,
    })
}

/// Read a scalar field as a string; numbers and booleans are stringified.
fn scalar(item: &Value, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Turn a catalog title into a safe directory name.
pub fn sanitize_dir_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_end_matches('.').trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "untitled".to_string()
    } else {
        cleaned.to_string()
    }
}

fn link_text(title: &str) -> String {
    let title = title.trim();
    if title.is_empty() {
        "Untitled".into()
    } else {
        title.replace('[', "\\[").replace(']', "\\]")
    }
}

fn link_path(path: &str) -> String {
    path.replace(' ', "%20")
        .replace('(', "%28")
        .replace(')', "%29")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const TOC: &str = r#"
- type: META
  count: 4
  display_level: 1
- type: TITLE
  title: Getting Started
  uuid: t1
  url: ''
  parent_uuid: ''
  level: 0
- type: DOC
  title: Install
  uuid: d1
  url: install
  parent_uuid: t1
  level: 1
- type: DOC
  title: Configure
  uuid: d2
  url: 2024
  parent_uuid: d1
  level: 2
- type: LINK
  title: Homepage
  uuid: l1
  url: https://example.com
  parent_uuid: ''
  level: 0
- type: DOC
  title: FAQ
  uuid: d3
  url: faq
  parent_uuid: ''
  level: 0
"#;

    #[test]
    fn parse_builds_tree() {
        let catalog = Catalog::parse(TOC).unwrap();
        assert_eq!(catalog.roots.len(), 3);

        let started = &catalog.roots[0];
        assert_eq!(started.kind, NodeKind::Title);
        assert_eq!(started.children[0].target, "install");
        assert_eq!(started.children[0].children[0].target, "2024");
        assert_eq!(catalog.roots[1].kind, NodeKind::Link);
    }

    #[test]
    fn doc_dirs_follow_ancestors() {
        let dirs = Catalog::parse(TOC).unwrap().doc_dirs();
        assert_eq!(dirs["install"], PathBuf::from("Getting Started"));
        assert_eq!(dirs["2024"], PathBuf::from("Getting Started").join("Install"));
        assert_eq!(dirs["faq"], PathBuf::new());
    }

    #[test]
    fn orphans_become_roots() {
        let yaml = "- {type: DOC, title: Lost, uuid: a, url: lost, parent_uuid: gone}\n";
        let catalog = Catalog::parse(yaml).unwrap();
        assert_eq!(catalog.roots.len(), 1);
        assert_eq!(catalog.roots[0].target, "lost");
    }

    #[test]
    fn parent_cycles_do_not_hang() {
        let yaml = "- {type: DOC, title: A, uuid: a, url: a, parent_uuid: b}\n- {type: DOC, title: B, uuid: b, url: b, parent_uuid: a}\n";
        let catalog = Catalog::parse(yaml).unwrap();
        assert!(catalog.roots.is_empty());
    }

    #[test]
    fn empty_and_invalid_yaml() {
        assert!(Catalog::parse("").unwrap().roots.is_empty());
        assert!(Catalog::parse("key: [unclosed").is_err());
    }

    #[test]
    fn index_lists_catalog_then_rest() {
        let catalog = Catalog::parse(TOC).unwrap();
        let docs = vec![
            ("install".to_string(), "Install".to_string()),
            ("faq".to_string(), "FAQ".to_string()),
            ("notes".to_string(), "Loose Notes".to_string()),
        ];
        let paths: HashMap<String, String> = [
            ("install", "Getting Started/install.md"),
            ("faq", "faq.md"),
            ("notes", "notes.md"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let index = catalog.render_index("Handbook", &docs, &paths);
        assert_eq!(
            index,
            "# Handbook\n\n\
             - Getting Started\n\
             \x20 - [Install](Getting%20Started/install.md)\n\
             \x20   - Configure\n\
             - [Homepage](https://example.com)\n\
             - [FAQ](faq.md)\n\
             \n## Other documents\n\n\
             - [Loose Notes](notes.md)\n"
        );
    }

    #[test]
    fn sanitize_dir_names() {
        assert_eq!(sanitize_dir_name("API / Reference"), "API _ Reference");
        assert_eq!(sanitize_dir_name("  ..  "), "untitled");
        assert_eq!(sanitize_dir_name("Notes."), "Notes");
        assert_eq!(sanitize_dir_name("入门指南"), "入门指南");
    }
}
