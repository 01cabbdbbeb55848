//! Bulk conversion of the crawled store into a Markdown tree.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use lakeexport_crawler::{META_DIR_NAME, MetaStore};
use lakeexport_markdown::{ConvertOptions, convert_document};
use lakeexport_shared::{
    DocDetail, LakeExportError, ProgressReporter, Result, validate_path_component,
};

use crate::manifest::{BuildManifest, ManifestEntry, sha256_hex};
use crate::toc::Catalog;

/// Name of the per-repo index file.
pub const INDEX_FILE_NAME: &str = "README.md";

/// Configuration for [`build`].
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Crawl storage root (contains `.meta/`).
    pub storage_dir: PathBuf,
    /// Root of the Markdown tree.
    pub output_dir: PathBuf,
    /// Service host, used to derive each document's `source_url`.
    pub host: String,
    /// Convert every document even if its source is unchanged.
    pub force: bool,
    /// Ignore catalogs and write every document at the repo root.
    pub flat: bool,
    /// Prepend YAML frontmatter to each document.
    pub frontmatter: bool,
}

/// Summary of a completed build.
#[derive(Debug, Clone, Default)]
pub struct BuildResult {
    pub repos: usize,
    pub converted: usize,
    pub unchanged: usize,
    pub removed: usize,
    /// `(source path, message)` of documents that failed to convert.
    pub errors: Vec<(String, String)>,
    pub duration: Duration,
}

/// Convert every crawled document below `storage_dir` into `output_dir`.
///
/// Documents whose source hash matches the previous build and whose output
/// still exists are skipped. Outputs of the previous build that this build no
/// longer produces are deleted.
#[instrument(skip_all, fields(storage = %opts.storage_dir.display(), out = %opts.output_dir.display()))]
pub fn build(opts: &BuildOptions, progress: &dyn ProgressReporter) -> Result<BuildResult> {
    let start = Instant::now();
    let store = MetaStore::new(&opts.storage_dir);
    if !store.meta_dir().is_dir() {
        return Err(LakeExportError::validation(format!(
            "no crawled data at {}; run `lakeexport crawl` first",
            store.meta_dir().display()
        )));
    }

    progress.phase("Scanning crawled repos");
    let namespaces = discover_namespaces(store.meta_dir())?;
    info!(repos = namespaces.len(), "starting build");

    let previous = BuildManifest::load(&opts.output_dir)?;
    let mut next = BuildManifest::default();
    let mut result = BuildResult {
        repos: namespaces.len(),
        ..Default::default()
    };

    for (i, namespace) in namespaces.iter().enumerate() {
        progress.phase(&format!(
            "Converting {namespace} ({}/{})",
            i + 1,
            namespaces.len()
        ));
        build_repo(
            namespace,
            &store,
            opts,
            &previous,
            &mut next,
            &mut result,
            progress,
        )?;
    }

    progress.phase("Removing stale outputs");
    for output in previous.stale_outputs(&next) {
        let path = output_path(&opts.output_dir, output);
        if path.is_file() {
            std::fs::remove_file(&path).map_err(|e| LakeExportError::io(&path, e))?;
            remove_empty_parents(&path, &opts.output_dir);
            result.removed += 1;
            debug!(output, "removed stale output");
        }
    }

    next.save(&opts.output_dir)?;
    progress.done();

    result.duration = start.elapsed();
    info!(
        repos = result.repos,
        converted = result.converted,
        unchanged = result.unchanged,
        removed = result.removed,
        errors = result.errors.len(),
        elapsed_ms = result.duration.as_millis() as u64,
        "build complete"
    );
    Ok(result)
}

/// `<login>/<repo>` of every directory holding a `docs/` folder, sorted.
fn discover_namespaces(meta_dir: &Path) -> Result<Vec<String>> {
    let mut namespaces = Vec::new();
    for entry in WalkDir::new(meta_dir)
        .min_depth(3)
        .max_depth(3)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            LakeExportError::validation(format!("walk {}: {e}", meta_dir.display()))
        })?;
        if !entry.file_type().is_dir() || entry.file_name() != "docs" {
            continue;
        }

        let Some(repo_dir) = entry.path().parent() else {
            continue;
        };
        let Ok(relative) = repo_dir.strip_prefix(meta_dir) else {
            continue;
        };
        let parts: Vec<_> = relative
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .collect();
        if let [login, repo] = parts.as_slice() {
            namespaces.push(format!("{login}/{repo}"));
        }
    }
    Ok(namespaces)
}

fn build_repo(
    namespace: &str,
    store: &MetaStore,
    opts: &BuildOptions,
    previous: &BuildManifest,
    next: &mut BuildManifest,
    result: &mut BuildResult,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let repo_dir = store.namespace_dir(namespace)?;
    let repo_name = store
        .repo(namespace)?
        .map(|r| r.name)
        .unwrap_or_else(|| namespace.to_string());

    let catalog = load_catalog(&repo_dir.join("toc.yaml"), namespace);
    let dirs = if opts.flat {
        HashMap::new()
    } else {
        catalog.doc_dirs()
    };

    let titles: HashMap<String, String> = store
        .docs(namespace)?
        .unwrap_or_default()
        .into_iter()
        .map(|d| (d.slug, d.title))
        .collect();

    let slugs = store.doc_slugs(namespace)?;
    let mut built: Vec<(String, String)> = Vec::new();
    let mut paths: HashMap<String, String> = HashMap::new();

    for (i, slug) in slugs.iter().enumerate() {
        let slug = validate_path_component(slug)?;
        let source = repo_dir.join("docs").join(format!("{slug}.json"));

        let mut relative = dirs.get(slug).cloned().unwrap_or_default();
        let at_root = relative.as_os_str().is_empty();
        relative.push(doc_file_name(slug, at_root));
        let relative = to_slash(&relative);
        let output = format!("{namespace}/{relative}");

        let bytes = std::fs::read(&source).map_err(|e| LakeExportError::io(&source, e))?;
        let sha256 = sha256_hex(&bytes);
        let source_key = source.display().to_string();

        let target = output_path(&opts.output_dir, &output);
        if !opts.force && previous.is_current(&output, &sha256) && target.is_file() {
            result.unchanged += 1;
        } else {
            match convert_source(&bytes, namespace, slug, opts) {
                Ok(markdown) => {
                    write_output(&target, &markdown)?;
                    result.converted += 1;
                }
                Err(e) => {
                    warn!(source = %source_key, error = %e, "document skipped");
                    result.errors.push((source_key, e.to_string()));
                    // Keep the last good output; its old hash forces a retry next build.
                    if let Some(entry) = previous.outputs.get(&output) {
                        next.outputs.insert(output.clone(), entry.clone());
                        paths.insert(slug.to_string(), relative);
                        built.push((slug.to_string(), title_of(&titles, slug)));
                    }
                    continue;
                }
            }
        }

        progress.doc_converted(&output, i + 1, slugs.len());
        next.outputs.insert(
            output,
            ManifestEntry {
                source: source_key,
                sha256,
            },
        );
        paths.insert(slug.to_string(), relative);
        built.push((slug.to_string(), title_of(&titles, slug)));
    }

    let index = catalog.render_index(&repo_name, &built, &paths);
    let index_output = format!("{namespace}/{INDEX_FILE_NAME}");
    write_output(&output_path(&opts.output_dir, &index_output), &index)?;
    next.outputs.insert(
        index_output,
        ManifestEntry {
            source: repo_dir.join("toc.yaml").display().to_string(),
            sha256: sha256_hex(index.as_bytes()),
        },
    );

    debug!(namespace, docs = slugs.len(), "repo built");
    Ok(())
}

fn convert_source(bytes: &[u8], namespace: &str, slug: &str, opts: &BuildOptions) -> Result<String> {
    let doc: DocDetail = serde_json::from_slice(bytes)
        .map_err(|e| LakeExportError::parse(format!("raw document {namespace}/{slug}: {e}")))?;

    let convert_opts = ConvertOptions {
        source_url: Some(format!(
            "{}/{namespace}/{slug}",
            opts.host.trim_end_matches('/')
        )),
        frontmatter: opts.frontmatter,
        ..Default::default()
    };
    Ok(convert_document(&doc, &convert_opts)?.markdown)
}

/// Missing or malformed catalogs fall back to a flat layout.
fn load_catalog(path: &Path, namespace: &str) -> Catalog {
    let yaml = match std::fs::read_to_string(path) {
        Ok(yaml) => yaml,
        Err(_) => return Catalog::default(),
    };
    Catalog::parse(&yaml).unwrap_or_else(|e| {
        warn!(namespace, error = %e, "ignoring catalog");
        Catalog::default()
    })
}

/// `<slug>.md`, unless that would be the repo index; then `<slug>-doc.md`.
fn doc_file_name(slug: &str, at_root: bool) -> String {
    let name = format!("{slug}.md");
    if at_root && name.eq_ignore_ascii_case(INDEX_FILE_NAME) {
        format!("{slug}-doc.md")
    } else {
        name
    }
}

fn title_of(titles: &HashMap<String, String>, slug: &str) -> String {
    titles.get(slug).cloned().unwrap_or_else(|| slug.to_string())
}

fn output_path(output_dir: &Path, output: &str) -> PathBuf {
    output.split('/').fold(output_dir.to_path_buf(), |p, c| p.join(c))
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LakeExportError::io(parent, e))?;
    }
    std::fs::write(path, content).map_err(|e| LakeExportError::io(path, e))
}

/// Remove directories left empty by a deletion, stopping at `root`.
fn remove_empty_parents(path: &Path, root: &Path) {
    let mut dir = path.parent();
    while let Some(current) = dir {
        if current == root || !current.starts_with(root) {
            break;
        }
        if std::fs::remove_dir(current).is_err() {
            break;
        }
        dir = current.parent();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
