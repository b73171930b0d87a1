// src/utils.rs
use std::path::{Path, PathBuf};

/// Pseudo-format that expands to every format a theme declares.
pub const ALL_FORMAT: &str = "all";

/// Get a path's extension in lowercase
pub fn path_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// The requested format of a destination path; no extension means "all".
pub fn requested_format(path: &Path) -> String {
    path_extension(path).unwrap_or_else(|| ALL_FORMAT.to_string())
}

/// Replace the "all" pseudo-extension (or append when there is none) with `ext`.
pub fn with_format_extension(path: &Path, ext: &str) -> PathBuf {
    match path_extension(path).as_deref() {
        Some(ALL_FORMAT) => path.with_extension(ext),
        Some(_) => path.to_path_buf(),
        None => {
            let mut name = path.as_os_str().to_os_string();
            name.push(".");
            name.push(ext);
            PathBuf::from(name)
        }
    }
}

pub fn normalize_path(base: &Path, relative: &Path) -> PathBuf {
    if relative.is_absolute() {
        relative.to_path_buf()
    } else {
        base.join(relative)
    }
}

/// Whether two paths name the same file, comparing canonical forms when both exist.
pub fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_format() {
        assert_eq!(requested_format(Path::new("out/resume.all")), "all");
        assert_eq!(requested_format(Path::new("out/resume")), "all");
        assert_eq!(requested_format(Path::new("out/resume.html")), "html");
        assert_eq!(requested_format(Path::new("out/resume.PDF")), "pdf");
    }

    #[test]
    fn test_with_format_extension() {
        assert_eq!(
            with_format_extension(Path::new("out/resume.all"), "yml"),
            PathBuf::from("out/resume.yml")
        );
        assert_eq!(
            with_format_extension(Path::new("out/resume"), "md"),
            PathBuf::from("out/resume.md")
        );
        assert_eq!(
            with_format_extension(Path::new("out/resume.txt"), "md"),
            PathBuf::from("out/resume.txt")
        );
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/base"), Path::new("x/y")),
            PathBuf::from("/base/x/y")
        );
        assert_eq!(
            normalize_path(Path::new("/base"), Path::new("/abs")),
            PathBuf::from("/abs")
        );
    }
}
