//! Filesystem operations on session media.
//!
//! Images and clips live at deterministic paths (see [`crate::paths`]), so
//! these helpers only copy, measure and delete.

use ageline_core::error::{AgelineError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Copies the uploaded reference photo into the session directory.
pub async fn import_reference(source: &Path, dest: &Path) -> Result<()> {
    if !fs::try_exists(source).await.unwrap_or(false) {
        return Err(AgelineError::not_found(
            "Reference image",
            source.display().to_string(),
        ));
    }
    ensure_parent(dest).await?;
    fs::copy(source, dest).await.map_err(|e| {
        AgelineError::io(format!(
            "Failed to copy reference image to '{}': {}",
            dest.display(),
            e
        ))
    })?;
    Ok(())
}

/// Creates the parent directory of `path` if needed.
pub async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(|e| {
            AgelineError::io(format!(
                "Failed to create directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }
    Ok(())
}

/// True when `path` is a regular, non-empty file.
pub async fn is_usable_file(path: &Path) -> bool {
    match fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

/// Deletes files that are no longer referenced by a manifest.
///
/// Best effort: missing files are ignored and other failures are logged.
/// Returns the number of files actually removed.
pub async fn remove_orphans(paths: &[PathBuf]) -> usize {
    let mut removed = 0;
    for path in paths {
        match fs::remove_file(path).await {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    "[MediaStore] Failed to remove orphaned file {}: {}",
                    path.display(),
                    e
                );
            }
        }
    }
    if removed > 0 {
        tracing::debug!("[MediaStore] Removed {} orphaned file(s)", removed);
    }
    removed
}

/// Whether `path` is a download still being written (`.<name>.part`).
pub fn is_partial_download(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.') && name.ends_with(".part"))
}

/// Deletes every regular file in `dir` that is not listed in `keep`.
///
/// In-progress downloads are left alone. A missing directory counts as
/// empty. Returns the number of files removed.
pub async fn remove_untracked(dir: &Path, keep: &[PathBuf]) -> usize {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => return 0,
    };
    let mut stale = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if is_file && !keep.contains(&path) && !is_partial_download(&path) {
            stale.push(path);
        }
    }
    remove_orphans(&stale).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_import_reference_copies_into_session() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("upload.jpg");
        std::fs::write(&source, b"jpeg").unwrap();
        let dest = temp_dir.path().join("sessions/abc/reference.jpg");

        import_reference(&source, &dest).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"jpeg");
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_import_missing_reference_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let err = import_reference(
            &temp_dir.path().join("missing.png"),
            &temp_dir.path().join("out.png"),
        )
        .await
        .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_usable_file_requires_content() {
        let temp_dir = TempDir::new().unwrap();
        let empty = temp_dir.path().join("empty.mp4");
        let full = temp_dir.path().join("full.mp4");
        std::fs::write(&empty, b"").unwrap();
        std::fs::write(&full, b"clip").unwrap();

        assert!(!is_usable_file(&empty).await);
        assert!(is_usable_file(&full).await);
        assert!(!is_usable_file(&temp_dir.path().join("none.mp4")).await);
        assert!(!is_usable_file(temp_dir.path()).await);
    }

    #[tokio::test]
    async fn test_remove_orphans_ignores_missing() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.mp4");
        std::fs::write(&a, b"x").unwrap();

        let removed = remove_orphans(&[a.clone(), temp_dir.path().join("b.mp4")]).await;

        assert_eq!(removed, 1);
        assert!(!a.exists());
    }

    #[tokio::test]
    async fn test_remove_untracked_keeps_active_set() {
        let temp_dir = TempDir::new().unwrap();
        let keep = temp_dir.path().join("0-7.mp4");
        let stale = temp_dir.path().join("7-9.mp4");
        let downloading = temp_dir.path().join(".7-12.mp4.part");
        std::fs::write(&keep, b"x").unwrap();
        std::fs::write(&stale, b"y").unwrap();
        std::fs::write(&downloading, b"z").unwrap();

        let removed = remove_untracked(temp_dir.path(), std::slice::from_ref(&keep)).await;

        assert_eq!(removed, 1);
        assert!(keep.exists());
        assert!(!stale.exists());
        assert!(downloading.exists());
        assert_eq!(
            remove_untracked(&temp_dir.path().join("missing"), &[]).await,
            0
        );
    }
}
