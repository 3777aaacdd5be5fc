//! Agent runtime binary resolution
//!
//! Resolution order, first match wins:
//! 1. `COPILOT_CLI_PATH` (must exist)
//! 2. `copilot` on `$PATH`
//! 3. A previously downloaded binary in the version-pinned cache dir
//! 4. Download from the npm registry (skipped when
//!    `KUBEPILOT_DISABLE_RUNTIME_DOWNLOAD` is set)

use std::path::{Path, PathBuf};
use std::time::Duration;

use flate2::read::GzDecoder;
use futures::StreamExt;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::paths;

/// Pinned runtime version; a new value means a new cache key.
pub const RUNTIME_VERSION: &str = "0.0.420";

pub const NPM_REGISTRY_URL: &str = "https://registry.npmjs.org";

const PATH_OVERRIDE_VAR: &str = "COPILOT_CLI_PATH";
const DISABLE_DOWNLOAD_VAR: &str = "KUBEPILOT_DISABLE_RUNTIME_DOWNLOAD";
const PACKAGE_SCOPE: &str = "@github";
const BINARY_STEM: &str = "copilot";

const REGISTRY_TIMEOUT: Duration = Duration::from_secs(15);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("package registry: {0}")]
    Registry(String),

    #[error("download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("runtime binary not found in archive")]
    BinaryNotInArchive,

    #[error("cannot create runtime cache dir {}: {source}", .path.display())]
    NoCacheDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("runtime binary not found and download is disabled (KUBEPILOT_DISABLE_RUNTIME_DOWNLOAD)")]
    DownloadDisabled,
}

/// npm package suffix for a Rust `(OS, ARCH)` pair
pub fn platform_suffix(os: &str, arch: &str) -> Option<&'static str> {
    match (os, arch) {
        ("macos", "aarch64") => Some("darwin-arm64"),
        ("macos", "x86_64") => Some("darwin-x64"),
        ("linux", "x86_64") => Some("linux-x64"),
        ("linux", "aarch64") => Some("linux-arm64"),
        ("windows", "x86_64") => Some("win32-x64"),
        ("windows", "aarch64") => Some("win32-arm64"),
        _ => None,
    }
}

fn binary_name(os: &str) -> String {
    if os == "windows" {
        format!("{}.exe", BINARY_STEM)
    } else {
        BINARY_STEM.to_string()
    }
}

#[derive(Debug, Deserialize)]
struct PackageMetadata {
    dist: PackageDist,
}

#[derive(Debug, Deserialize)]
struct PackageDist {
    #[serde(default)]
    tarball: String,
}

/// Locates or provisions the runtime executable
pub struct RuntimeResolver {
    http_client: reqwest::Client,
    version: String,
    registry_url: String,
    cache_dir: PathBuf,
    os: String,
    arch: String,
    path_override: Option<PathBuf>,
    search_path: bool,
    allow_download: bool,
}

impl Default for RuntimeResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeResolver {
    /// Resolver for the host platform, honouring the environment overrides
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::new(),
            version: RUNTIME_VERSION.to_string(),
            registry_url: NPM_REGISTRY_URL.to_string(),
            cache_dir: paths::runtime_cache_dir(RUNTIME_VERSION),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            path_override: std::env::var_os(PATH_OVERRIDE_VAR)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            search_path: true,
            allow_download: std::env::var_os(DISABLE_DOWNLOAD_VAR).is_none(),
        }
    }

    pub fn with_platform(mut self, os: impl Into<String>, arch: impl Into<String>) -> Self {
        self.os = os.into();
        self.arch = arch.into();
        self
    }

    pub fn with_registry_url(mut self, url: impl Into<String>) -> Self {
        self.registry_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn with_path_override(mut self, path: Option<PathBuf>) -> Self {
        self.path_override = path;
        self
    }

    /// Skip the `$PATH` lookup
    pub fn without_path_lookup(mut self) -> Self {
        self.search_path = false;
        self
    }

    pub fn with_download(mut self, allow: bool) -> Self {
        self.allow_download = allow;
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Where a downloaded binary lives
    pub fn cached_path(&self) -> PathBuf {
        self.cache_dir.join(binary_name(&self.os))
    }

    /// Find the runtime, downloading it if needed
    pub async fn resolve(&self) -> Result<PathBuf, ResolveError> {
        if let Some(path) = &self.path_override {
            if path.exists() {
                debug!("Using runtime from {}: {:?}", PATH_OVERRIDE_VAR, path);
                return Ok(path.clone());
            }
            warn!(
                "{} points to a missing file: {:?}",
                PATH_OVERRIDE_VAR, path
            );
        }

        if self.search_path {
            if let Ok(path) = which::which(BINARY_STEM) {
                debug!("Using runtime from PATH: {:?}", path);
                return Ok(path);
            }
        }

        let cached = self.cached_path();
        if cached.exists() {
            info!("Using cached runtime: {:?}", cached);
            return Ok(cached);
        }

        if !self.allow_download {
            return Err(ResolveError::DownloadDisabled);
        }

        info!("Agent runtime not found, downloading {}", self.version);
        self.download().await
    }

    /// Download and unpack the pinned version into the cache dir
    pub async fn download(&self) -> Result<PathBuf, ResolveError> {
        let suffix = platform_suffix(&self.os, &self.arch).ok_or_else(|| {
            ResolveError::UnsupportedPlatform {
                os: self.os.clone(),
                arch: self.arch.clone(),
            }
        })?;

        let tarball_url = self.tarball_url(suffix).await?;
        info!("Downloading runtime from: {}", tarball_url);

        let response = self
            .http_client
            .get(&tarball_url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        let mut body = response.bytes_stream();
        let mut bytes = Vec::new();
        while let Some(chunk) = body.next().await {
            bytes.extend_from_slice(&chunk?);
        }
        info!("Downloaded {} bytes", bytes.len());

        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|source| ResolveError::NoCacheDir {
                path: self.cache_dir.clone(),
                source,
            })?;

        let dest = self.cached_path();
        let target = dest.clone();
        let suffix = suffix.to_string();
        tokio::task::spawn_blocking(move || extract_binary(&bytes, &suffix, &target))
            .await
            .map_err(std::io::Error::other)??;
        info!("Installed runtime to {:?}", dest);
        Ok(dest)
    }

    async fn tarball_url(&self, suffix: &str) -> Result<String, ResolveError> {
        let package = format!("{}/{}-{}", PACKAGE_SCOPE, BINARY_STEM, suffix);
        let url = format!("{}/{}/{}", self.registry_url, package, self.version);
        debug!("Resolving tarball via {}", url);

        let response = self
            .http_client
            .get(&url)
            .timeout(REGISTRY_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ResolveError::Registry(format!(
                "{} for {}@{}",
                response.status(),
                package,
                self.version
            )));
        }

        let meta: PackageMetadata = response
            .json()
            .await
            .map_err(|e| ResolveError::Registry(format!("invalid package metadata: {}", e)))?;
        if meta.dist.tarball.is_empty() {
            return Err(ResolveError::Registry(
                "no tarball URL in package metadata".to_string(),
            ));
        }
        Ok(meta.dist.tarball)
    }
}

/// Pull the runtime binary out of an npm `.tgz` and move it to `dest`.
/// npm archives keep files under `package/`; README and package.json are skipped.
/// The binary is staged next to `dest` and renamed into place, so `dest`
/// only ever holds a complete file.
pub(crate) fn extract_binary(archive: &[u8], suffix: &str, dest: &Path) -> Result<(), ResolveError> {
    let staging = staging_path(dest);
    let result = extract_to(archive, suffix, &staging).and_then(|()| {
        std::fs::rename(&staging, dest)?;
        Ok(())
    });
    if result.is_err() {
        let _ = std::fs::remove_file(&staging);
    }
    result
}

fn staging_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    dest.with_file_name(name)
}

fn extract_to(archive: &[u8], suffix: &str, dest: &Path) -> Result<(), ResolveError> {
    let platform_name = format!("{}-{}", BINARY_STEM, suffix);
    let exe_name = format!("{}.exe", BINARY_STEM);
    let mut archive = tar::Archive::new(GzDecoder::new(archive));

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry.path()?.into_owned();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name != BINARY_STEM && name != exe_name && name != platform_name {
            continue;
        }

        let expected = entry.size();
        let mut file = std::fs::File::create(dest)?;
        let written = std::io::copy(&mut entry, &mut file)?;
        if written != expected {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("runtime binary truncated: {} of {} bytes", written, expected),
            )
            .into());
        }
        file.sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(dest)?.permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(dest, perms)?;
        }
        debug!("Extracted {:?} to {:?}", path, dest);
        return Ok(());
    }

    Err(ResolveError::BinaryNotInArchive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn tarball(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (path, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, path, data.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    /// Resolver that never consults the host environment
    fn isolated(cache: &Path) -> RuntimeResolver {
        RuntimeResolver::new()
            .with_path_override(None)
            .without_path_lookup()
            .with_cache_dir(cache)
            .with_platform("linux", "x86_64")
    }

    /// Minimal HTTP server: serves package metadata, then the tarball.
    async fn serve_registry(archive: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let tarball_url = format!("{}/tarball.tgz", base);

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let mut buf = vec![0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let path = request.split_whitespace().nth(1).unwrap_or("").to_string();

                let (status, body) = if path.ends_with("/tarball.tgz") {
                    ("200 OK", archive.clone())
                } else if path == format!("/@github/copilot-linux-x64/{}", RUNTIME_VERSION) {
                    let meta = serde_json::json!({"dist": {"tarball": tarball_url}});
                    ("200 OK", meta.to_string().into_bytes())
                } else {
                    ("404 Not Found", b"{}".to_vec())
                };
                let head = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status,
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            }
        });

        base
    }

    #[test]
    fn test_platform_suffix() {
        assert_eq!(platform_suffix("macos", "aarch64"), Some("darwin-arm64"));
        assert_eq!(platform_suffix("linux", "x86_64"), Some("linux-x64"));
        assert_eq!(platform_suffix("windows", "aarch64"), Some("win32-arm64"));
        assert_eq!(platform_suffix("freebsd", "x86_64"), None);
        assert_eq!(binary_name("windows"), "copilot.exe");
        assert_eq!(binary_name("linux"), "copilot");
    }

    #[tokio::test]
    async fn test_unsupported_platform_fails_before_network() {
        let temp = tempfile::tempdir().unwrap();
        // Port 9 (discard) on localhost; any request would fail with Http, not this
        let resolver = isolated(temp.path())
            .with_platform("plan9", "mips")
            .with_registry_url("http://127.0.0.1:9");

        let err = resolver.resolve().await.unwrap_err();
        match err {
            ResolveError::UnsupportedPlatform { os, arch } => {
                assert_eq!(os, "plan9");
                assert_eq!(arch, "mips");
            }
            other => panic!("expected UnsupportedPlatform, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_env_override_wins() {
        let temp = tempfile::tempdir().unwrap();
        let custom = temp.path().join("my-copilot");
        std::fs::write(&custom, b"#!/bin/sh\n").unwrap();

        let resolver = isolated(temp.path()).with_path_override(Some(custom.clone()));
        assert_eq!(resolver.resolve().await.unwrap(), custom);
    }

    #[tokio::test]
    async fn test_missing_override_falls_through_to_cache() {
        let temp = tempfile::tempdir().unwrap();
        let cached = temp.path().join("copilot");
        std::fs::write(&cached, b"bin").unwrap();

        let resolver = isolated(temp.path())
            .with_path_override(Some(temp.path().join("does-not-exist")))
            .with_download(false);
        assert_eq!(resolver.resolve().await.unwrap(), cached);
    }

    #[tokio::test]
    async fn test_disabled_download_reports_error() {
        let temp = tempfile::tempdir().unwrap();
        let resolver = isolated(&temp.path().join("empty")).with_download(false);
        assert!(matches!(
            resolver.resolve().await,
            Err(ResolveError::DownloadDisabled)
        ));
    }

    #[test]
    fn test_extract_binary_skips_other_entries() {
        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("copilot");
        let archive = tarball(&[
            ("package/README.md", "readme"),
            ("package/package.json", "{}"),
            ("package/copilot", "\x7fELF-runtime"),
        ]);

        extract_binary(&archive, "linux-x64", &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"\x7fELF-runtime");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&dest).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn test_extract_binary_accepts_platform_name() {
        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("copilot");
        let archive = tarball(&[("package/copilot-linux-x64", "bin")]);
        extract_binary(&archive, "linux-x64", &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"bin");
    }

    #[test]
    fn test_extract_binary_missing() {
        let temp = tempfile::tempdir().unwrap();
        let archive = tarball(&[("package/LICENSE", "mit")]);
        let err = extract_binary(&archive, "linux-x64", &temp.path().join("copilot")).unwrap_err();
        assert!(matches!(err, ResolveError::BinaryNotInArchive));
    }

    #[test]
    fn test_truncated_archive_leaves_nothing_behind() {
        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("copilot");

        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let payload: String = (0..200_000)
            .map(|_| {
                seed ^= seed << 13;
                seed ^= seed >> 7;
                seed ^= seed << 17;
                char::from(b'!' + (seed % 90) as u8)
            })
            .collect();
        let archive = tarball(&[("package/copilot", payload.as_str())]);
        let truncated = &archive[..archive.len() * 6 / 10];

        assert!(extract_binary(truncated, "linux-x64", &dest).is_err());
        assert!(!dest.exists());
        assert!(!staging_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_partial_file_is_not_a_cache_hit() {
        let temp = tempfile::tempdir().unwrap();
        let resolver = isolated(temp.path()).with_download(false);
        std::fs::write(staging_path(&resolver.cached_path()), b"half a bin").unwrap();

        assert!(matches!(
            resolver.resolve().await,
            Err(ResolveError::DownloadDisabled)
        ));
    }

    #[tokio::test]
    async fn test_download_from_registry() {
        let temp = tempfile::tempdir().unwrap();
        let cache = temp.path().join("cache").join(RUNTIME_VERSION);
        let base = serve_registry(tarball(&[("package/copilot", "runtime-bytes")])).await;

        let resolver = isolated(&cache).with_registry_url(base);
        let path = resolver.resolve().await.unwrap();
        assert_eq!(path, cache.join("copilot"));
        assert_eq!(std::fs::read(&path).unwrap(), b"runtime-bytes");
        assert!(!staging_path(&path).exists());

        // Second resolve is a cache hit
        assert_eq!(resolver.resolve().await.unwrap(), path);
    }

    #[tokio::test]
    async fn test_registry_error_status() {
        let temp = tempfile::tempdir().unwrap();
        let base = serve_registry(Vec::new()).await;
        let resolver = isolated(temp.path())
            .with_platform("linux", "aarch64")
            .with_registry_url(base);

        let err = resolver.resolve().await.unwrap_err();
        assert!(matches!(err, ResolveError::Registry(_)), "{:?}", err);
        assert!(err.to_string().contains("404"));
    }
}
