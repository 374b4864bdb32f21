use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::{APP_DIR_NAME, YOLO_MODEL_NAME, YOLO_MODEL_URL};

#[derive(Error, Debug)]
pub enum ModelResolveError {
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

/// Locates model files, downloading them into a cache on first use.
///
/// Lookup order is the cache directory, then the optional bundled directory,
/// then a download into the cache.
#[derive(Clone, Debug)]
pub struct ModelResolver {
    cache_dir: PathBuf,
    bundled_dir: Option<PathBuf>,
}

impl ModelResolver {
    /// Resolver over the platform cache directory.
    pub fn new() -> Result<Self, ModelResolveError> {
        Ok(Self::with_cache_dir(default_cache_dir()?))
    }

    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            bundled_dir: None,
        }
    }

    /// Also looks in `dir` (e.g. next to the executable) before downloading.
    pub fn with_bundled_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bundled_dir = Some(dir.into());
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn resolve(
        &self,
        name: &str,
        url: &str,
        progress: Option<ProgressFn>,
    ) -> Result<PathBuf, ModelResolveError> {
        let cached_path = self.cache_dir.join(name);
        if cached_path.exists() {
            log::debug!("Using cached model {}", cached_path.display());
            return Ok(cached_path);
        }

        if let Some(bundled_path) = self
            .bundled_dir
            .as_ref()
            .map(|dir| dir.join(name))
            .filter(|p| p.exists())
        {
            log::debug!("Using bundled model {}", bundled_path.display());
            return Ok(bundled_path);
        }

        fs::create_dir_all(&self.cache_dir).map_err(ModelResolveError::CacheDir)?;
        log::info!("Downloading {name} from {url}");
        download(url, &cached_path, progress)?;
        Ok(cached_path)
    }

    /// Resolves the YOLO face model used by the default detector.
    pub fn resolve_face_model(
        &self,
        progress: Option<ProgressFn>,
    ) -> Result<PathBuf, ModelResolveError> {
        self.resolve(YOLO_MODEL_NAME, YOLO_MODEL_URL, progress)
    }
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/FaceGuide/models/`
/// - Linux: `$XDG_CACHE_HOME/FaceGuide/models/` or `~/.cache/FaceGuide/models/`
/// - Windows: `%LOCALAPPDATA%/FaceGuide/models/`
pub fn default_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    let root = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let root = dirs::cache_dir();

    root.map(|d| d.join(APP_DIR_NAME).join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

/// Downloads to `<dest>.part` and renames on success; the partial file is
/// removed on any error.
fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");
    let result = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })
        .and_then(|response| {
            let total = response.content_length().unwrap_or(0);
            copy_with_progress(response, &temp_path, total, progress.as_deref())
        })
        .and_then(|()| {
            fs::rename(&temp_path, dest).map_err(|e| ModelResolveError::Write {
                path: dest.to_path_buf(),
                source: e,
            })
        });

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

/// Streams `reader` into `path` in 1 MiB chunks, reporting progress after
/// each chunk.
fn copy_with_progress(
    mut reader: impl Read,
    path: &Path,
    total: u64,
    progress: Option<&(dyn Fn(u64, u64) + Send)>,
) -> Result<(), ModelResolveError> {
    let write_err = |e| ModelResolveError::Write {
        path: path.to_path_buf(),
        source: e,
    };

    let mut file = fs::File::create(path).map_err(write_err)?;
    let mut buf = vec![0u8; 1024 * 1024];
    let mut copied: u64 = 0;
    loop {
        let n = reader.read(&mut buf).map_err(write_err)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err)?;
        copied += n as u64;
        if let Some(cb) = progress {
            cb(copied, total);
        }
    }
    file.flush().map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    const UNREACHABLE_URL: &str = "http://invalid.nonexistent.example.com/model.onnx";

    #[test]
    fn test_resolve_prefers_cached_file() {
        let tmp = TempDir::new().unwrap();
        let cached = tmp.path().join("face.onnx");
        fs::write(&cached, b"cached").unwrap();

        let resolver = ModelResolver::with_cache_dir(tmp.path());
        assert_eq!(resolver.resolve("face.onnx", UNREACHABLE_URL, None).unwrap(), cached);
    }

    #[test]
    fn test_resolve_falls_back_to_bundled_file() {
        let tmp = TempDir::new().unwrap();
        let bundled_dir = tmp.path().join("bundled");
        fs::create_dir_all(&bundled_dir).unwrap();
        fs::write(bundled_dir.join("face.onnx"), b"bundled").unwrap();

        let resolver =
            ModelResolver::with_cache_dir(tmp.path().join("cache")).with_bundled_dir(&bundled_dir);
        let path = resolver.resolve("face.onnx", UNREACHABLE_URL, None).unwrap();
        assert_eq!(path, bundled_dir.join("face.onnx"));
    }

    #[test]
    fn test_resolve_download_failure_leaves_no_partial_file() {
        let tmp = TempDir::new().unwrap();
        let resolver = ModelResolver::with_cache_dir(tmp.path().join("cache"));

        let err = resolver.resolve("face.onnx", UNREACHABLE_URL, None).unwrap_err();
        assert!(matches!(err, ModelResolveError::Download { .. }));
        assert!(!tmp.path().join("cache/face.onnx").exists());
        assert!(!tmp.path().join("cache/face.part").exists());
    }

    #[test]
    fn test_default_cache_dir_is_namespaced() {
        let path = default_cache_dir().unwrap();
        assert!(path.ends_with(Path::new(APP_DIR_NAME).join("models")));
    }

    #[test]
    fn test_copy_with_progress_reports_running_total() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("out.bin");
        let payload = vec![7u8; 3 * 1024 * 1024 + 10];

        let last = Arc::new(AtomicU64::new(0));
        let seen = last.clone();
        let cb = move |done: u64, total: u64| {
            assert_eq!(total, 42);
            seen.store(done, Ordering::SeqCst);
        };
        copy_with_progress(payload.as_slice(), &dest, 42, Some(&cb)).unwrap();

        assert_eq!(last.load(Ordering::SeqCst), payload.len() as u64);
        assert_eq!(fs::read(&dest).unwrap(), payload);
    }
}
