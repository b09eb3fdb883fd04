//! Local copies of remote WSDL documents.
//!
//! Cached files live at `<cache dir>/<sha1 of the lowercased url>.xml` and are never
//! refreshed once written. With caching disabled the document goes to a uniquely named file
//! in the same directory which is removed when its [`LocalWsdl`] is dropped.

use log::debug;
use sha1::{Digest, Sha1};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tempfile::TempPath;

use crate::{
    error::Error,
    options::WsdlCacheMode,
    transport::{self, HttpRequest, Method, RequestHeaders, TransportOptions},
};

/// Resolves the WSDL cache directory, creating it when missing and checking that it can be
/// written to. The returned path always ends with a separator.
pub fn resolve_cache_path(requested: Option<&Path>) -> Result<PathBuf, Error> {
    let requested = requested
        .map(Path::to_path_buf)
        .unwrap_or_else(std::env::temp_dir);

    if !requested.exists() {
        fs::create_dir_all(&requested).map_err(|source| Error::CacheDirectoryCreate {
            path: requested.clone(),
            source,
        })?;
        debug!("Created WSDL cache directory {}", requested.display());
    }

    let mut resolved = requested
        .canonicalize()
        .map_err(|source| Error::CacheDirectoryCreate {
            path: requested.clone(),
            source,
        })?;

    tempfile::Builder::new()
        .prefix(".soapplus-probe")
        .tempfile_in(&resolved)
        .map_err(|source| Error::CacheDirectoryNotWritable {
            path: resolved.clone(),
            source,
        })?;

    resolved.push("");
    Ok(resolved)
}

/// The cache file name for a WSDL url.
pub fn cache_file_name(url: &str) -> String {
    let digest = Sha1::digest(url.to_lowercase().as_bytes());
    format!("{}.xml", hex::encode(digest))
}

/// Whether a WSDL locator has to be fetched over the network.
pub fn is_remote(locator: &str) -> bool {
    locator
        .get(..4)
        .map_or(false, |scheme| scheme.eq_ignore_ascii_case("http"))
}

/// Combines the process default with an explicit `cache_wsdl` request.
pub fn caching_enabled(default: bool, requested: Option<WsdlCacheMode>) -> Result<bool, Error> {
    match requested {
        None => Ok(default),
        Some(WsdlCacheMode::Disk) => Ok(true),
        Some(WsdlCacheMode::None) => Ok(false),
        Some(mode) => Err(Error::UnsupportedCacheMode(mode)),
    }
}

#[derive(Debug)]
pub enum LocalWsdl {
    Cached(PathBuf),
    Temporary(TempPath),
}

impl LocalWsdl {
    pub fn path(&self) -> &Path {
        match self {
            LocalWsdl::Cached(path) => path,
            LocalWsdl::Temporary(path) => path,
        }
    }

    pub fn file_name(&self) -> Option<String> {
        self.path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, LocalWsdl::Temporary(_))
    }

    /// Removes a temporary copy now instead of on drop. Cached copies are left alone.
    pub fn close(self) -> std::io::Result<()> {
        match self {
            LocalWsdl::Cached(_) => Ok(()),
            LocalWsdl::Temporary(path) => path.close(),
        }
    }
}

pub struct WsdlCache<'a> {
    directory: &'a Path,
    enabled: bool,
}

impl<'a> WsdlCache<'a> {
    pub fn new(directory: &'a Path, enabled: bool) -> Self {
        Self { directory, enabled }
    }

    /// Returns a local copy of the WSDL at `url`, fetching it only on a cache miss.
    pub fn load(&self, url: &str, options: &TransportOptions) -> Result<LocalWsdl, Error> {
        let file_name = cache_file_name(url);
        let cached = self.directory.join(&file_name);

        if self.enabled && cached.exists() {
            debug!("Using cached WSDL {} for {}", cached.display(), url);
            return Ok(LocalWsdl::Cached(cached));
        }

        debug!("Fetching WSDL {}", url);
        let exchange = transport::execute(
            &HttpRequest {
                method: Method::Get,
                url,
                headers: &RequestHeaders::new(),
                body: None,
            },
            options,
        );

        if exchange.status != 200 || exchange.error.is_some() || exchange.body.is_empty() {
            return Err(Error::WsdlRetrieval {
                url: url.to_owned(),
                status: exchange.status,
                detail: exchange
                    .error
                    .unwrap_or_else(|| "empty or unexpected response".into()),
            });
        }

        let contents = exchange.body.trim();

        if self.enabled {
            fs::write(&cached, contents)?;
            debug!("Cached WSDL {} as {}", url, cached.display());
            return Ok(LocalWsdl::Cached(cached));
        }

        let stem = file_name.trim_end_matches(".xml");
        let mut temporary = tempfile::Builder::new()
            .prefix(&format!("{}.", stem))
            .suffix(".tmp.xml")
            .tempfile_in(self.directory)?;
        std::io::Write::write_all(&mut temporary, contents.as_bytes())?;
        let path = temporary.into_temp_path();
        debug!("Wrote uncached WSDL {} to {}", url, path.display());

        Ok(LocalWsdl::Temporary(path))
    }
}
