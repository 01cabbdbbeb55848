//! Single-file conversion for `lakeexport convert`.

use std::path::Path;

use tracing::instrument;

use lakeexport_markdown::{
    ConvertOptions, ConvertResult, convert_document, convert_lake, convert_markdown,
};
use lakeexport_shared::{DocDetail, LakeExportError, Result};

/// Convert one file: a raw document (`.json`), a Markdown body (`.md`), or a
/// bare Lake/HTML body (anything else).
#[instrument(skip(opts), fields(path = %path.display()))]
pub fn convert_file(path: &Path, opts: &ConvertOptions) -> Result<ConvertResult> {
    let content = std::fs::read_to_string(path).map_err(|e| LakeExportError::io(path, e))?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    if extension == "json" || content.trim_start().starts_with('{') {
        let doc: DocDetail = serde_json::from_str(&content).map_err(|e| {
            LakeExportError::parse(format!("{}: not a raw document: {e}", path.display()))
        })?;
        return convert_document(&doc, opts);
    }

    if extension == "md" || extension == "markdown" {
        return convert_markdown(&content, opts);
    }

    convert_lake(&content, opts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare() -> ConvertOptions {
        ConvertOptions {
            frontmatter: false,
            ..Default::default()
        }
    }

    #[test]
    fn raw_document_json() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("intro.json");
        std::fs::write(
            &path,
            r#"{"id":1,"slug":"intro","title":"Intro","body_lake":"<p>Hello</p>","updated_at":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let result = convert_file(&path, &bare()).unwrap();
        assert_eq!(result.title, "Intro");
        assert_eq!(result.markdown, "Hello\n");
    }

    #[test]
    fn bare_lake_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("page.lake");
        std::fs::write(&path, "<!doctype lake><h1>Page</h1><p>Text</p>").unwrap();

        let result = convert_file(&path, &bare()).unwrap();
        assert_eq!(result.title, "Page");
        assert!(result.markdown.contains("Text"));
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.json");
        std::fs::write(&path, "{\"id\":").unwrap();

        assert!(matches!(
            convert_file(&path, &bare()),
            Err(LakeExportError::Parse { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            convert_file(Path::new("/nonexistent/doc.lake"), &bare()),
            Err(LakeExportError::Io { .. })
        ));
    }
}
