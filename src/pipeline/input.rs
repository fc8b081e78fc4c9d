//! Input resolution: turn user-supplied paths into accepted source files.
//!
//! A path may name a file or a directory. Directories contribute their
//! immediate regular-file entries in name order, the way a multi-select in a
//! file picker would. Every candidate is then checked against the fixed
//! image allow-list; everything else is rejected without being read.

use crate::error::AvifError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Image types the webhook accepts, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
    Gif,
    Bmp,
    Tiff,
}

/// Accepted extensions, lowercase, without the dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "webp", "gif", "bmp", "tiff"];

impl ImageKind {
    /// Classify a path by its extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpeg" | "jpg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            "webp" => Some(ImageKind::Webp),
            "gif" => Some(ImageKind::Gif),
            "bmp" => Some(ImageKind::Bmp),
            "tiff" => Some(ImageKind::Tiff),
            _ => None,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Webp => "image/webp",
            ImageKind::Gif => "image/gif",
            ImageKind::Bmp => "image/bmp",
            ImageKind::Tiff => "image/tiff",
        }
    }
}

/// A file that passed the allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Final path component, used as the display and upload name.
    pub name: String,
    pub size: u64,
    pub kind: ImageKind,
}

impl SourceFile {
    /// Inspect a single path. `Ok(None)` means "exists but not a supported image".
    pub fn from_path(path: &Path) -> Result<Option<Self>, AvifError> {
        let meta = std::fs::metadata(path).map_err(|_| AvifError::InputNotFound {
            path: path.to_path_buf(),
        })?;
        if !meta.is_file() {
            return Ok(None);
        }
        let Some(kind) = ImageKind::from_path(path) else {
            return Ok(None);
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Some(SourceFile {
            path: path.to_path_buf(),
            name,
            size: meta.len(),
            kind,
        }))
    }
}

/// Result of resolving a set of input paths.
#[derive(Debug, Default)]
pub struct ResolvedInputs {
    pub accepted: Vec<SourceFile>,
    pub rejected: Vec<PathBuf>,
}

/// Expand directories and split inputs into accepted and rejected files.
pub fn resolve_inputs<P: AsRef<Path>>(paths: &[P]) -> Result<ResolvedInputs, AvifError> {
    let mut resolved = ResolvedInputs::default();

    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            for entry in list_dir(path)? {
                classify(&entry, &mut resolved)?;
            }
        } else {
            classify(path, &mut resolved)?;
        }
    }

    debug!(
        "Resolved inputs: {} accepted, {} rejected",
        resolved.accepted.len(),
        resolved.rejected.len()
    );
    Ok(resolved)
}

fn classify(path: &Path, resolved: &mut ResolvedInputs) -> Result<(), AvifError> {
    match SourceFile::from_path(path)? {
        Some(file) => resolved.accepted.push(file),
        None => resolved.rejected.push(path.to_path_buf()),
    }
    Ok(())
}

/// Immediate regular files of `dir`, sorted by name.
fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, AvifError> {
    let not_found = || AvifError::InputNotFound {
        path: dir.to_path_buf(),
    };
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|_| not_found())?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_extension_is_case_insensitive() {
        assert_eq!(ImageKind::from_path(Path::new("a.JPG")), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_path(Path::new("a.jpeg")), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_path(Path::new("a.Tiff")), Some(ImageKind::Tiff));
        assert_eq!(ImageKind::from_path(Path::new("a.tif")), None);
        assert_eq!(ImageKind::from_path(Path::new("a.avif")), None);
        assert_eq!(ImageKind::from_path(Path::new("noext")), None);
    }

    #[test]
    fn every_supported_extension_classifies() {
        for ext in SUPPORTED_EXTENSIONS {
            let p = PathBuf::from(format!("x.{ext}"));
            assert!(ImageKind::from_path(&p).is_some(), "{ext}");
        }
    }

    #[test]
    fn resolve_splits_accepted_and_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("b.png");
        let txt = dir.path().join("notes.txt");
        std::fs::write(&png, b"12345").unwrap();
        std::fs::write(&txt, b"hi").unwrap();

        let resolved = resolve_inputs(&[&png, &txt]).unwrap();
        assert_eq!(resolved.accepted.len(), 1);
        assert_eq!(resolved.accepted[0].name, "b.png");
        assert_eq!(resolved.accepted[0].size, 5);
        assert_eq!(resolved.accepted[0].kind.mime_type(), "image/png");
        assert_eq!(resolved.rejected, vec![txt]);
    }

    #[test]
    fn directory_expands_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.webp", "a.jpg", "b.gif", "skip.md"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();

        let resolved = resolve_inputs(&[dir.path()]).unwrap();
        let names: Vec<_> = resolved.accepted.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b.gif", "c.webp"]);
        assert_eq!(resolved.rejected.len(), 1);
    }

    #[test]
    fn missing_path_is_an_error() {
        let err = resolve_inputs(&["/definitely/not/here.png"]).unwrap_err();
        assert!(matches!(err, AvifError::InputNotFound { .. }));
    }
}
