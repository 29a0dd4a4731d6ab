use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("model not found at {0}")]
    NotFound(PathBuf),
    #[error("model {name} is not cached in {cache_dir} and no download URL is configured")]
    NotCached { name: String, cache_dir: PathBuf },
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Where to look for the detection model.
pub struct ModelSource<'a> {
    /// Explicitly configured model file. When set, nothing else is tried.
    pub explicit: Option<&'a Path>,
    /// File name inside the cache directory.
    pub name: &'a str,
    /// Optional download location used on a cache miss.
    pub url: Option<&'a str>,
    pub cache_dir: &'a Path,
}

/// Resolve the model file.
///
/// Resolution order:
/// 1. Explicit path (must exist)
/// 2. Cache directory
/// 3. Download from URL into the cache, if a URL is configured
pub fn resolve(
    source: &ModelSource<'_>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(path) = source.explicit {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(ModelResolveError::NotFound(path.to_path_buf()))
        };
    }

    let cached_path = source.cache_dir.join(source.name);
    if cached_path.is_file() {
        return Ok(cached_path);
    }

    let Some(url) = source.url else {
        return Err(ModelResolveError::NotCached {
            name: source.name.to_string(),
            cache_dir: source.cache_dir.to_path_buf(),
        });
    };

    fs::create_dir_all(source.cache_dir).map_err(ModelResolveError::CacheDir)?;
    log::info!("Downloading model from {url}");
    download(url, &cached_path, progress)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/crowdcount/models/`
/// - Linux: `$XDG_CACHE_HOME/crowdcount/models/` or `~/.cache/crowdcount/models/`
/// - Windows: `%LOCALAPPDATA%/crowdcount/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join("crowdcount").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join("crowdcount").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");

    let result = download_inner(url, dest, &temp_path, progress);

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }

    result
}

fn download_inner(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let write_err = |e| ModelResolveError::Write {
        path: temp_path.to_path_buf(),
        source: e,
    };

    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;
    let mut file = fs::File::create(temp_path).map_err(write_err)?;

    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = response.read(&mut buf).map_err(write_err)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err)?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(write_err)?;
    drop(file);

    fs::rename(temp_path, dest).map_err(|e| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;

    Ok(())
}
