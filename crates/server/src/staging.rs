use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const OUTPUT_PREFIX: &str = "final_";
const OUTPUT_EXTENSION: &str = "mp4";
const FALLBACK_STEM: &str = "upload";

/// A per-request file under the staging directory.
///
/// Removed on drop unless [`StagedFile::publish`] moved it elsewhere, so a
/// failed or abandoned request leaves nothing behind.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    published: bool,
}

impl StagedFile {
    /// Reserve a uniquely named path in `dir` with the given extension.
    pub fn new(dir: &Path, extension: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let name = format!("{}.{extension}", uuid::Uuid::new_v4());
        Ok(Self {
            path: dir.join(name),
            published: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move the staged file to `dest`, replacing any existing file.
    ///
    /// Within one filesystem this is a rename, so readers of `dest` see
    /// either the previous artifact or the complete new one.
    pub fn publish(mut self, dest: &Path) -> io::Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        if fs::rename(&self.path, dest).is_err() {
            self.copy_into_place(dest)?;
            let _ = fs::remove_file(&self.path);
        }
        self.published = true;
        Ok(())
    }

    /// Cross-filesystem publish: copy next to `dest`, then rename over it.
    fn copy_into_place(&self, dest: &Path) -> io::Result<()> {
        let tmp = self.fallback_temp_path(dest);
        let result = fs::copy(&self.path, &tmp).and_then(|_| fs::rename(&tmp, dest));
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }

    /// Hidden sibling of `dest` named after this staged file, so concurrent
    /// publishes to the same name never share a temp file and
    /// [`resolve_artifact`] never serves one.
    fn fallback_temp_path(&self, dest: &Path) -> PathBuf {
        let staged = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        dest.with_file_name(format!(".{staged}.part"))
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.published && self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                log::warn!("Failed to remove staged file {}: {e}", self.path.display());
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GateState {
    Open,
    Committed,
    Abandoned,
}

/// Decides, exactly once, whether a request's artifact is published or
/// discarded when the request is abandoned after a timeout.
#[derive(Debug)]
pub struct PublishGate {
    state: Mutex<GateState>,
}

impl Default for PublishGate {
    fn default() -> Self {
        Self {
            state: Mutex::new(GateState::Open),
        }
    }
}

impl PublishGate {
    /// Runs `publish` unless the request was already abandoned.
    /// Returns `Ok(false)` when abandoned.
    pub fn commit<F>(&self, publish: F) -> io::Result<bool>
    where
        F: FnOnce() -> io::Result<()>,
    {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == GateState::Abandoned {
            return Ok(false);
        }
        publish()?;
        *state = GateState::Committed;
        Ok(true)
    }

    /// Marks the request abandoned. Returns `false` if publishing already
    /// happened, in which case the caller should wait for the result.
    pub fn abandon(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == GateState::Committed {
            return false;
        }
        *state = GateState::Abandoned;
        true
    }
}

/// Reduce a client-supplied file name to a safe single path component.
///
/// Directory parts are dropped, whitespace becomes `_`, and anything other
/// than ASCII alphanumerics, `-`, `_` and `.` is removed.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('_')
            } else if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                Some(c)
            } else {
                None
            }
        })
        .collect();
    cleaned.trim_start_matches(['.', '_']).to_string()
}

/// Artifact name for an uploaded video: `final_{stem}.mp4`.
pub fn output_name(uploaded: &str) -> String {
    let sanitized = sanitize_filename(uploaded);
    let stem = Path::new(&sanitized)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(FALLBACK_STEM);
    format!("{OUTPUT_PREFIX}{stem}.{OUTPUT_EXTENSION}")
}

/// Extension to stage an upload under, from its file name or content type.
pub fn upload_extension(filename: Option<&str>, content_type: &str) -> String {
    let from_name = filename
        .map(sanitize_filename)
        .and_then(|name| {
            Path::new(&name)
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase())
        })
        .filter(|e| !e.is_empty());
    from_name.unwrap_or_else(|| {
        content_type
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("bin")
            .to_string()
    })
}

/// Path of a published artifact, or `None` unless `name` is a plain file
/// name that exists inside `output_dir`.
pub fn resolve_artifact(output_dir: &Path, name: &str) -> Option<PathBuf> {
    let is_plain = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
        && name != "..";
    if !is_plain {
        return None;
    }
    let path = output_dir.join(name);
    path.is_file().then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("clip.mp4", "final_clip.mp4")]
    #[case("clip.avi", "final_clip.mp4")]
    #[case("../../etc/passwd", "final_passwd.mp4")]
    #[case("C:\\Users\\cam 1.mov", "final_cam_1.mp4")]
    #[case("", "final_upload.mp4")]
    #[case("...", "final_upload.mp4")]
    fn test_output_name(#[case] uploaded: &str, #[case] expected: &str) {
        assert_eq!(output_name(uploaded), expected);
    }

    #[test]
    fn test_output_name_is_deterministic() {
        assert_eq!(output_name("street.mp4"), output_name("street.mp4"));
    }

    #[rstest]
    #[case(Some("a.MOV"), "video/mov", "mov")]
    #[case(Some("noext"), "video/mp4", "mp4")]
    #[case(None, "image/png", "png")]
    fn test_upload_extension(
        #[case] name: Option<&str>,
        #[case] content_type: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(upload_extension(name, content_type), expected);
    }

    #[test]
    fn test_staged_file_removed_on_drop() {
        let tmp = TempDir::new().unwrap();
        let path = {
            let staged = StagedFile::new(tmp.path(), "mp4").unwrap();
            fs::write(staged.path(), b"partial").unwrap();
            staged.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_staged_files_are_unique() {
        let tmp = TempDir::new().unwrap();
        let a = StagedFile::new(tmp.path(), "mp4").unwrap();
        let b = StagedFile::new(tmp.path(), "mp4").unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_publish_moves_and_replaces() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("out").join("final_a.mp4");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, b"old").unwrap();

        let staged = StagedFile::new(&tmp.path().join("staging"), "mp4").unwrap();
        fs::write(staged.path(), b"new").unwrap();
        let staged_path = staged.path().to_path_buf();
        staged.publish(&dest).unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"new");
        assert!(!staged_path.exists());
    }

    #[test]
    fn test_fallback_temp_paths_differ_per_staged_file() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("final_a.mp4");
        let a = StagedFile::new(tmp.path(), "mp4").unwrap();
        let b = StagedFile::new(tmp.path(), "mp4").unwrap();

        let (ta, tb) = (a.fallback_temp_path(&dest), b.fallback_temp_path(&dest));
        assert_ne!(ta, tb);
        assert_eq!(ta.parent(), dest.parent());
        let name = ta.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with('.') && name.ends_with(".part"));
        assert!(resolve_artifact(tmp.path(), name).is_none());
    }

    #[test]
    fn test_copy_into_place_leaves_no_temp_file() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("out");
        fs::create_dir_all(&out).unwrap();
        let dest = out.join("final_a.mp4");
        fs::write(&dest, b"old").unwrap();

        let staged = StagedFile::new(&tmp.path().join("staging"), "mp4").unwrap();
        fs::write(staged.path(), b"new").unwrap();
        staged.copy_into_place(&dest).unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"new");
        assert!(!staged.fallback_temp_path(&dest).exists());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 1);
    }

    #[test]
    fn test_gate_publishes_when_open() {
        let gate = PublishGate::default();
        let mut ran = false;
        assert!(gate.commit(|| {
            ran = true;
            Ok(())
        })
        .unwrap());
        assert!(ran);
        assert!(!gate.abandon());
    }

    #[test]
    fn test_gate_skips_publish_after_abandon() {
        let gate = PublishGate::default();
        assert!(gate.abandon());
        let published = gate
            .commit(|| panic!("must not publish after abandon"))
            .unwrap();
        assert!(!published);
    }

    #[test]
    fn test_gate_failed_publish_can_still_be_abandoned() {
        let gate = PublishGate::default();
        assert!(gate
            .commit(|| Err(io::Error::new(io::ErrorKind::Other, "disk full")))
            .is_err());
        assert!(gate.abandon());
    }

    #[test]
    fn test_resolve_artifact_serves_existing_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("final_a.mp4"), b"x").unwrap();
        assert_eq!(
            resolve_artifact(tmp.path(), "final_a.mp4"),
            Some(tmp.path().join("final_a.mp4"))
        );
    }

    #[rstest]
    #[case("does-not-exist.mp4")]
    #[case("../secret.mp4")]
    #[case("..")]
    #[case(".staging")]
    #[case("")]
    #[case("sub/final_a.mp4")]
    fn test_resolve_artifact_rejects(#[case] name: &str) {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join(".staging")).unwrap();
        fs::create_dir_all(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub").join("final_a.mp4"), b"x").unwrap();
        assert!(resolve_artifact(tmp.path(), name).is_none());
    }
}
