//! On-disk mirror of the remote account.
//!
//! Layout under `<storage_dir>/.meta/`:
//! ```text
//! user.json
//! <login>/repos.json
//! <login>/<repo>/repo.json
//! <login>/<repo>/docs.json
//! <login>/<repo>/toc.yaml
//! <login>/<repo>/docs/<slug>.json
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use lakeexport_shared::{
    DocDetail, DocSummary, LakeExportError, Repo, Result, User, validate_path_component,
};

/// Directory under the storage root that holds the mirror.
pub const META_DIR_NAME: &str = ".meta";

/// Reads and writes the local mirror.
#[derive(Debug, Clone)]
pub struct MetaStore {
    meta_dir: PathBuf,
}

impl MetaStore {
    /// Open the mirror under `storage_dir`. Nothing is created until the first write.
    pub fn new(storage_dir: impl AsRef<Path>) -> Self {
        Self {
            meta_dir: storage_dir.as_ref().join(META_DIR_NAME),
        }
    }

    pub fn meta_dir(&self) -> &Path {
        &self.meta_dir
    }

    // -- reads ---------------------------------------------------------------

    pub fn user(&self) -> Result<Option<User>> {
        self.read_json(&self.meta_dir.join("user.json"))
    }

    pub fn repos(&self, login: &str) -> Result<Option<Vec<Repo>>> {
        let dir = self.login_dir(login)?;
        self.read_json(&dir.join("repos.json"))
    }

    pub fn repo(&self, namespace: &str) -> Result<Option<Repo>> {
        let dir = self.namespace_dir(namespace)?;
        self.read_json(&dir.join("repo.json"))
    }

    pub fn docs(&self, namespace: &str) -> Result<Option<Vec<DocSummary>>> {
        let dir = self.namespace_dir(namespace)?;
        self.read_json(&dir.join("docs.json"))
    }

    pub fn doc(&self, namespace: &str, slug: &str) -> Result<Option<DocDetail>> {
        let path = self.doc_path(namespace, slug)?;
        self.read_json(&path)
    }

    /// Whether a raw document file exists for `slug`.
    pub fn has_doc(&self, namespace: &str, slug: &str) -> Result<bool> {
        Ok(self.doc_path(namespace, slug)?.is_file())
    }

    /// Repo slugs that have a local directory under `login`, sorted.
    pub fn local_repo_slugs(&self, login: &str) -> Result<Vec<String>> {
        let dir = self.login_dir(login)?;
        list_names(&dir, |path| path.is_dir().then(|| file_name(path)).flatten())
    }

    /// Slugs of locally stored raw documents of a repo, sorted.
    pub fn doc_slugs(&self, namespace: &str) -> Result<Vec<String>> {
        let dir = self.namespace_dir(namespace)?.join("docs");
        list_names(&dir, |path| {
            if path.extension().is_some_and(|ext| ext == "json") {
                path.file_stem().and_then(|s| s.to_str()).map(String::from)
            } else {
                None
            }
        })
    }

    // -- writes --------------------------------------------------------------

    pub fn save_user(&self, user: &User) -> Result<()> {
        self.write_json(&self.meta_dir.join("user.json"), user)
    }

    pub fn save_repos(&self, login: &str, repos: &[Repo]) -> Result<()> {
        let dir = self.login_dir(login)?;
        self.write_json(&dir.join("repos.json"), &repos)
    }

    pub fn save_repo(&self, repo: &Repo) -> Result<()> {
        let dir = self.namespace_dir(&repo.namespace)?;
        self.write_json(&dir.join("repo.json"), repo)
    }

    pub fn save_docs(&self, namespace: &str, docs: &[DocSummary]) -> Result<()> {
        let dir = self.namespace_dir(namespace)?;
        self.write_json(&dir.join("docs.json"), &docs)
    }

    pub fn save_doc(&self, namespace: &str, doc: &DocDetail) -> Result<()> {
        let path = self.doc_path(namespace, &doc.slug)?;
        self.write_json(&path, doc)
    }

    pub fn save_toc(&self, namespace: &str, toc_yml: &str) -> Result<()> {
        let path = self.namespace_dir(namespace)?.join("toc.yaml");
        write_file(&path, toc_yml.as_bytes())
    }

    // -- removals ------------------------------------------------------------

    pub fn remove_repo(&self, login: &str, slug: &str) -> Result<()> {
        let dir = self
            .login_dir(login)?
            .join(validate_path_component(slug)?);
        if dir.exists() {
            std::fs::remove_dir_all(&dir).map_err(|e| LakeExportError::io(&dir, e))?;
        }
        Ok(())
    }

    pub fn remove_doc(&self, namespace: &str, slug: &str) -> Result<()> {
        let path = self.doc_path(namespace, slug)?;
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| LakeExportError::io(&path, e))?;
        }
        Ok(())
    }

    // -- paths ---------------------------------------------------------------

    fn login_dir(&self, login: &str) -> Result<PathBuf> {
        Ok(self.meta_dir.join(validate_path_component(login)?))
    }

    /// Directory of `<login>/<repo>`.
    pub fn namespace_dir(&self, namespace: &str) -> Result<PathBuf> {
        let (login, repo) = namespace.split_once('/').ok_or_else(|| {
            LakeExportError::validation(format!("namespace {namespace:?} is not <login>/<repo>"))
        })?;
        Ok(self
            .meta_dir
            .join(validate_path_component(login)?)
            .join(validate_path_component(repo)?))
    }

    fn doc_path(&self, namespace: &str, slug: &str) -> Result<PathBuf> {
        let name = format!("{}.json", validate_path_component(slug)?);
        Ok(self.namespace_dir(namespace)?.join("docs").join(name))
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LakeExportError::io(path, e)),
        };

        match serde_json::from_str(&content) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable cache file");
                Ok(None)
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        let content = serde_json::to_string_pretty(value)
            .map_err(|e| LakeExportError::parse(format!("serialize {}: {e}", path.display())))?;
        write_file(path, content.as_bytes())
    }
}

fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LakeExportError::io(parent, e))?;
    }
    std::fs::write(path, content).map_err(|e| LakeExportError::io(path, e))?;
    debug!(path = %path.display(), bytes = content.len(), "saved");
    Ok(())
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().and_then(|s| s.to_str()).map(String::from)
}

/// Map the entries of `dir` through `select`; a missing directory is empty.
fn list_names(dir: &Path, select: impl Fn(&Path) -> Option<String>) -> Result<Vec<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(LakeExportError::io(dir, e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| LakeExportError::io(dir, e))?;
        if let Some(name) = select(&entry.path()) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
