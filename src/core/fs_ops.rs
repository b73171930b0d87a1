// src/core/fs_ops.rs
//! Blocking file system operations used while writing build outputs.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

pub struct FsOps;

impl FsOps {
    /// Create the directory and its parents; existing directories are fine.
    pub fn ensure_dir_exists(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {}", path.display()))?;
            debug!("Created directory: {}", path.display());
        }
        Ok(())
    }

    pub fn write_file_safe(path: &Path, content: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            Self::ensure_dir_exists(parent)?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write file: {}", path.display()))?;

        info!("Written file: {}", path.display());
        Ok(())
    }

    pub fn copy_file(src: &Path, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            Self::ensure_dir_exists(parent)?;
        }

        fs::copy(src, dest)
            .with_context(|| format!("Failed to copy {} to {}", src.display(), dest.display()))?;

        info!("Copied {} to {}", src.display(), dest.display());
        Ok(())
    }

    /// Create `link` pointing at `target`. An existing link or plain file at
    /// `link` is replaced; a real directory is left alone and reported.
    pub fn recreate_symlink(target: &Path, link: &Path) -> Result<()> {
        if let Some(parent) = link.parent() {
            Self::ensure_dir_exists(parent)?;
        }

        if let Ok(meta) = fs::symlink_metadata(link) {
            let file_type = meta.file_type();
            if file_type.is_dir() {
                bail!(
                    "Refusing to replace directory {} with a link to {}",
                    link.display(),
                    target.display()
                );
            }
            // Windows directory links only go away through remove_dir.
            fs::remove_file(link)
                .or_else(|err| {
                    if file_type.is_symlink() {
                        fs::remove_dir(link)
                    } else {
                        Err(err)
                    }
                })
                .with_context(|| format!("Failed to remove existing {}", link.display()))?;
            debug!("Removed existing link location {}", link.display());
        }

        Self::symlink(target, link).with_context(|| {
            format!("Failed to link {} -> {}", link.display(), target.display())
        })?;

        info!("Linked {} -> {}", link.display(), target.display());
        Ok(())
    }

    #[cfg(unix)]
    fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
        std::os::unix::fs::symlink(target, link)
    }

    #[cfg(windows)]
    fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
        if target.is_dir() {
            std::os::windows::fs::symlink_dir(target, link)
        } else {
            std::os::windows::fs::symlink_file(target, link)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a/b/c.txt");
        FsOps::write_file_safe(&file, b"hello").unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "hello");
        FsOps::ensure_dir_exists(&dir.path().join("a/b")).unwrap();
    }

    #[test]
    fn test_copy_file() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.css");
        fs::write(&src, "body{}").unwrap();
        let dest = dir.path().join("out/assets/site.css");
        FsOps::copy_file(&src, &dest).unwrap();
        assert_eq!(fs::read_to_string(dest).unwrap(), "body{}");
    }

    #[cfg(unix)]
    #[test]
    fn test_existing_symlink_is_replaced() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();
        let link = dir.path().join("out/assets");

        FsOps::recreate_symlink(&first, &link).unwrap();
        FsOps::recreate_symlink(&second, &link).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), second);
    }

    #[cfg(unix)]
    #[test]
    fn test_real_directory_is_not_replaced() {
        let dir = TempDir::new().unwrap();
        let theme_assets = dir.path().join("theme/assets");
        fs::create_dir_all(&theme_assets).unwrap();
        let link = dir.path().join("out/assets");
        fs::create_dir_all(&link).unwrap();
        fs::write(link.join("user.txt"), "keep me").unwrap();

        let err = FsOps::recreate_symlink(&theme_assets, &link).unwrap_err();
        assert!(err.to_string().contains("out/assets"));
        assert_eq!(fs::read_to_string(link.join("user.txt")).unwrap(), "keep me");
        assert!(!fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    }

    #[cfg(unix)]
    #[test]
    fn test_plain_file_is_replaced() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("theme/assets");
        fs::create_dir_all(&target).unwrap();
        let link = dir.path().join("out/assets");
        fs::create_dir_all(dir.path().join("out")).unwrap();
        fs::write(&link, "stale").unwrap();

        FsOps::recreate_symlink(&target, &link).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), target);
    }
}
