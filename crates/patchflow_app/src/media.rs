// SPDX-License-Identifier: MIT OR Apache-2.0
//! Filesystem-backed asset source.

use futures::FutureExt;
use patchflow_graph::MediaHandle;
use patchflow_runtime::{AssetError, AssetFuture, AssetSource, MediaResource, UrlRegistry};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Resolves media handles as paths relative to a root directory
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    /// Create a source rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, handle: &MediaHandle) -> PathBuf {
        let path = Path::new(handle.as_str());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    Some(match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "json" => "application/json",
        "txt" => "text/plain",
        _ => return None,
    })
}

impl AssetSource for FileSource {
    fn load(&self, handle: MediaHandle, urls: UrlRegistry) -> AssetFuture {
        let path = self.resolve(&handle);
        async move {
            let bytes = tokio::fs::read(&path).await.map_err(|err| match err.kind() {
                ErrorKind::NotFound => AssetError::NotFound(path.display().to_string()),
                _ => AssetError::Io(format!("{}: {err}", path.display())),
            })?;
            tracing::debug!("Loaded {} ({} bytes)", path.display(), bytes.len());

            let mut resource =
                MediaResource::new(handle.clone(), bytes).with_url(urls.create(&handle));
            if let Some(mime) = mime_for(&path) {
                resource = resource.with_mime(mime);
            }
            Ok(resource)
        }
        .boxed()
    }
}
