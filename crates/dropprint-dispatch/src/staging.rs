// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Local staging directory for downloaded documents.
//
// Every staged file lives directly inside the staging root.  Its name is
// the job key with `%`, path separators and NUL percent-escaped, so a key
// like `orders/2024/invoice.ps` can never create nested directories or
// point outside the root, and two distinct keys never share a file.

use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use dropprint_core::error::{DropprintError, Result};
use dropprint_core::types::JobKey;

/// Marks an in-progress write.  Never produced by `staged_name`, since every
/// `%` it emits is followed by two hex digits.
const PARTIAL_SUFFIX: &str = "%part";

/// Filesystem-safe, collision-free file name for `key`.
pub fn staged_name(key: &str) -> String {
    // "" and dot-only names would resolve to the root or its parent.
    if key.is_empty() {
        return "%".into();
    }
    if key.chars().all(|c| c == '.') {
        return "%2E".repeat(key.len());
    }

    let mut name = String::with_capacity(key.len());
    for c in key.chars() {
        match c {
            '%' => name.push_str("%25"),
            '/' => name.push_str("%2F"),
            '\\' => name.push_str("%5C"),
            '\0' => name.push_str("%00"),
            other => name.push(other),
        }
    }
    name
}

/// Lowercase hex SHA-256 of `data`.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Directory that holds staged documents until they are printed.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `key` is (or would be) staged.
    pub fn path_for(&self, key: &JobKey) -> PathBuf {
        self.root.join(staged_name(key.as_str()))
    }

    /// Whether `path` names a file directly inside the staging root.
    ///
    /// Purely lexical: `..`, `.` and trailing separators are not normalised,
    /// so `<root>/../x` is not staged.
    pub fn holds(&self, path: &Path) -> bool {
        let mut components = path.components();
        let file_is_normal = matches!(components.next_back(), Some(Component::Normal(_)));
        file_is_normal && components.as_path() == self.root.as_path()
    }

    /// Write `data` for `key` and return the staged path.
    ///
    /// The bytes go to a temporary sibling first and are renamed into
    /// place, so a half-written file is never mistaken for a staged job.
    pub async fn stage(&self, key: &JobKey, data: &[u8]) -> Result<PathBuf> {
        let stage_err = |source: std::io::Error| DropprintError::Stage {
            key: key.to_string(),
            source,
        };

        tokio::fs::create_dir_all(&self.root).await.map_err(stage_err)?;

        let path = self.path_for(key);
        let partial = self
            .root
            .join(format!("{}{PARTIAL_SUFFIX}", staged_name(key.as_str())));

        if let Err(e) = tokio::fs::write(&partial, data).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(stage_err(e));
        }
        tokio::fs::rename(&partial, &path).await.map_err(stage_err)?;

        info!(%key, path = %path.display(), bytes = data.len(), "document staged");
        Ok(path)
    }

    /// Remove a staged file.
    pub async fn remove(&self, path: &Path) -> Result<()> {
        tokio::fs::remove_file(path).await?;
        debug!(path = %path.display(), "staged file removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators_are_escaped() {
        assert_eq!(staged_name("orders/2024/invoice.ps"), "orders%2F2024%2Finvoice.ps");
        assert_eq!(staged_name(r"orders\2024\invoice.ps"), "orders%5C2024%5Cinvoice.ps");
        assert_eq!(staged_name("plain.ps"), "plain.ps");
        assert_eq!(staged_name("under_score.ps"), "under_score.ps");
    }

    #[test]
    fn distinct_keys_get_distinct_names() {
        let keys = [
            "a/b.ps", "a_b.ps", "a%2Fb.ps", r"a\b.ps", "a%b.ps", ".", "..", "%2E", "", "%",
        ];
        let names: std::collections::HashSet<_> = keys.iter().map(|k| staged_name(k)).collect();
        assert_eq!(names.len(), keys.len());
    }

    #[test]
    fn dot_only_names_cannot_escape() {
        assert_eq!(staged_name(".."), "%2E%2E");
        assert_eq!(staged_name("."), "%2E");
        assert_eq!(staged_name(""), "%");
        assert_eq!(staged_name("../../etc/passwd"), "..%2F..%2Fetc%2Fpasswd");
    }

    #[test]
    fn holds_only_direct_children_of_root() {
        let staging = StagingArea::new("/var/spool/dropprint");
        assert!(staging.holds(Path::new("/var/spool/dropprint/a.ps")));
        assert!(!staging.holds(Path::new("/var/spool/dropprint/../a.ps")));
        assert!(!staging.holds(Path::new("/var/spool/dropprint/sub/a.ps")));
        assert!(!staging.holds(Path::new("/var/spool/dropprint/sub/../a.ps")));
        assert!(!staging.holds(Path::new("/var/spool/dropprint")));
        assert!(!staging.holds(Path::new("/var/spool/a.ps")));
    }

    #[test]
    fn hash_is_stable_hex() {
        assert_eq!(
            hash_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn nested_key_is_staged_flat_inside_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let staging = StagingArea::new(dir.path().join("staging"));
        let key = JobKey::from("orders/2024/invoice.ps");

        let path = staging.stage(&key, b"%!PS\n").await.expect("stage");

        assert_eq!(path.parent(), Some(staging.root()));
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("orders%2F2024%2Finvoice.ps"));
        assert!(!staging.root().join("orders").exists());
        assert_eq!(std::fs::read(&path).expect("read"), b"%!PS\n");

        let leftovers: Vec<_> = std::fs::read_dir(staging.root())
            .expect("read_dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(PARTIAL_SUFFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn unwritable_root_is_a_stage_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").expect("write");
        let staging = StagingArea::new(&blocker);

        let err = staging
            .stage(&JobKey::from("a.ps"), b"x")
            .await
            .expect_err("root is a file");
        assert!(matches!(err, DropprintError::Stage { .. }));
    }
}
