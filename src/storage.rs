use std::path::{Path, PathBuf};

use color_eyre::Result;

/// Filesystem archive for uploaded CSV files, laid out as
/// `<root>/<account>/<deck>/<filename>`.
#[derive(Debug, Clone)]
pub struct CsvArchive {
    root: PathBuf,
}

impl CsvArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn store(
        &self,
        account_id: &str,
        deck_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<PathBuf> {
        let dir = self
            .root
            .join(sanitize_component(account_id))
            .join(sanitize_component(deck_id));
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(sanitize_filename(filename));
        tokio::fs::write(&path, bytes).await?;

        tracing::info!(deck_id, path = %path.display(), size = bytes.len(), "csv archived");
        Ok(path)
    }
}

fn sanitize_component(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match cleaned.trim_matches('.') {
        "" => "_".to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// Keeps only the final path segment of a client-supplied name.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    match sanitize_component(base).as_str() {
        "_" => "upload.csv".to_string(),
        name => name.to_string(),
    }
}
