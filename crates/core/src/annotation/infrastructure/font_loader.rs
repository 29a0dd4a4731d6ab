use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::FontVec;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FontError {
    #[error("failed to read font {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is not a valid TrueType/OpenType font")]
    Invalid(PathBuf),
    #[error("no usable font found; set a font path (searched: {0:?})")]
    NotFound(Vec<PathBuf>),
}

/// Common locations of a sans-serif TrueType font per platform.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Load the overlay font.
///
/// An explicit path must load; otherwise the first system candidate that
/// exists and parses is used.
pub fn load_font(explicit: Option<&Path>) -> Result<FontVec, FontError> {
    if let Some(path) = explicit {
        return load_from(path);
    }

    let candidates: Vec<PathBuf> = SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from).collect();
    for path in &candidates {
        if !path.is_file() {
            continue;
        }
        match load_from(path) {
            Ok(font) => {
                log::debug!("Using font {}", path.display());
                return Ok(font);
            }
            Err(e) => log::warn!("Skipping font: {e}"),
        }
    }
    Err(FontError::NotFound(candidates))
}

fn load_from(path: &Path) -> Result<FontVec, FontError> {
    let bytes = fs::read(path).map_err(|e| FontError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    FontVec::try_from_vec(bytes).map_err(|_| FontError::Invalid(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_explicit_font_is_read_error() {
        let err = load_font(Some(Path::new("/nonexistent/font.ttf"))).unwrap_err();
        assert!(matches!(err, FontError::Read { .. }));
    }

    #[test]
    fn test_garbage_font_is_invalid() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"not a font").unwrap();
        let err = load_font(Some(file.path())).unwrap_err();
        assert!(matches!(err, FontError::Invalid(_)));
    }

    #[test]
    fn test_system_search_reports_candidates_when_nothing_found() {
        // Only meaningful on hosts without any candidate font installed
        if let Err(FontError::NotFound(searched)) = load_font(None) {
            assert_eq!(searched.len(), SYSTEM_FONT_CANDIDATES.len());
        }
    }
}
