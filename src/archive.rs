//! Downloading, caching and unpacking of source archives.

use std::{
    fs::{self, File},
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use thiserror::Error;
use xz2::read::XzDecoder;

use crate::flock::FileLock;

const SANITIZED_URL_MAX_LEN: usize = 128;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("{url}: file url should have no network location (got {netloc})")]
    InvalidSourceUrl { url: String, netloc: String },
    #[error("Unsupported archive format: {}", path.display())]
    UnsupportedArchiveFormat { path: PathBuf },
    #[error("Error while downloading {url}: {source}")]
    Download { url: String, source: reqwest::Error },
    #[error("Error while reading zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Cache entry lock cannot be acquired: {0}")]
    Lock(#[from] crate::flock::Error),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}

/// Where the bytes of an archive come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceUrl<'a> {
    /// A path on the local filesystem, from a `file:` URL or a plain path.
    Local(PathBuf),
    /// Anything with another scheme, fetched over the network.
    Remote(&'a str),
}

impl<'a> SourceUrl<'a> {
    pub fn parse(url: &'a str) -> Result<SourceUrl<'a>, ArchiveError> {
        match split_scheme(url) {
            None => Ok(SourceUrl::Local(PathBuf::from(url))),
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("file") => {
                let path = match rest.strip_prefix("//") {
                    Some(authority_and_path) => {
                        let (netloc, path) = match authority_and_path.find('/') {
                            Some(index) => authority_and_path.split_at(index),
                            None => (authority_and_path, ""),
                        };
                        if !netloc.is_empty() {
                            return Err(ArchiveError::InvalidSourceUrl {
                                url: url.to_owned(),
                                netloc: netloc.to_owned(),
                            });
                        }
                        path
                    }
                    None => rest,
                };
                Ok(SourceUrl::Local(PathBuf::from(path)))
            }
            Some(_) => Ok(SourceUrl::Remote(url)),
        }
    }
}

/// Splits `scheme:rest` when `url` starts with a URL scheme.
fn split_scheme(url: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = url.split_once(':')?;
    let mut chars = scheme.chars();
    let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let valid = starts_with_letter
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some((scheme, rest))
}

/// Name of the cache entry for `url`: a hash of the full URL followed by a readable tail.
///
/// The readable part keeps the end of the URL, so the archive extension survives truncation.
pub fn cache_filename(url: &str) -> String {
    let digest = hex::encode(Sha256::digest(url.as_bytes()));
    let sanitized: String = url
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let tail = &sanitized[sanitized.len().saturating_sub(SANITIZED_URL_MAX_LEN)..];
    format!("{digest}_{tail}")
}

/// Returns a local path holding the archive behind `url`, downloading it into `cache_dir`
/// unless a local path was given or the archive is already cached.
pub fn resolve(url: &str, cache_dir: &Path) -> Result<PathBuf, ArchiveError> {
    let url = match SourceUrl::parse(url)? {
        SourceUrl::Local(path) => return Ok(path),
        SourceUrl::Remote(url) => url,
    };

    let cached = cache_dir.join(cache_filename(url));
    if cached.exists() {
        debug!("Using cached {} for {}", cached.display(), url);
        return Ok(cached);
    }

    fs::create_dir_all(cache_dir)?;
    let mut lock_path = cached.clone().into_os_string();
    lock_path.push(".lock");
    let _lock = FileLock::new(Path::new(&lock_path))?;

    // Another process may have finished the download while we were waiting.
    if cached.exists() {
        debug!("Using cached {} for {}", cached.display(), url);
    } else {
        download(url, &cached)?;
    }

    Ok(cached)
}

fn download(url: &str, destination: &Path) -> Result<(), ArchiveError> {
    info!("Downloading {} to {}", url, destination.display());
    let error = |source| ArchiveError::Download {
        url: url.to_owned(),
        source,
    };

    let mut response = reqwest::blocking::get(url)
        .and_then(|response| response.error_for_status())
        .map_err(error)?;

    let parent = destination.parent().unwrap_or(Path::new("."));
    let mut file = NamedTempFile::new_in(parent)?;
    let size = response.copy_to(&mut file).map_err(error)?;
    file.persist(destination).map_err(|e| e.error)?;

    debug!("Downloaded {} bytes from {}", size, url);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    TarGz,
    TarBz2,
    TarXz,
    Zip,
}

impl ArchiveFormat {
    /// Detects the format from the file name, falling back to the leading bytes of the file.
    pub fn detect(path: &Path) -> Result<ArchiveFormat, ArchiveError> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            return Ok(ArchiveFormat::TarGz);
        }
        if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") || name.ends_with(".tbz") {
            return Ok(ArchiveFormat::TarBz2);
        }
        if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            return Ok(ArchiveFormat::TarXz);
        }
        if name.ends_with(".tar") {
            return Ok(ArchiveFormat::Tar);
        }
        if name.ends_with(".zip") {
            return Ok(ArchiveFormat::Zip);
        }

        let mut header = Vec::with_capacity(512);
        File::open(path)?.take(512).read_to_end(&mut header)?;
        Self::from_magic(&header).ok_or_else(|| ArchiveError::UnsupportedArchiveFormat {
            path: path.to_path_buf(),
        })
    }

    fn from_magic(header: &[u8]) -> Option<ArchiveFormat> {
        if header.starts_with(&[0x1f, 0x8b]) {
            Some(ArchiveFormat::TarGz)
        } else if header.starts_with(b"BZh") {
            Some(ArchiveFormat::TarBz2)
        } else if header.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
            Some(ArchiveFormat::TarXz)
        } else if header.starts_with(b"PK\x03\x04") {
            Some(ArchiveFormat::Zip)
        } else if header.get(257..262) == Some(b"ustar".as_slice()) {
            Some(ArchiveFormat::Tar)
        } else {
            None
        }
    }
}

/// Unpacks `archive` into `target_dir` unless the directory already has content.
///
/// With `clean`, the target directory is removed first. Returns whether anything was unpacked.
pub fn extract(archive: &Path, target_dir: &Path, clean: bool) -> Result<bool, ArchiveError> {
    if clean && target_dir.exists() {
        info!("Removing '{}'", target_dir.display());
        fs::remove_dir_all(target_dir)?;
    }

    fs::create_dir_all(target_dir)?;
    if fs::read_dir(target_dir)?.next().is_some() {
        debug!(
            "'{}' is not empty, skipping extraction",
            target_dir.display()
        );
        return Ok(false);
    }

    let format = ArchiveFormat::detect(archive)?;
    info!(
        "Extracting '{}' to '{}'",
        archive.display(),
        target_dir.display()
    );

    if let Err(error) = unpack(archive, format, target_dir) {
        // A partially unpacked directory would look populated on the next run.
        if let Err(cleanup) = fs::remove_dir_all(target_dir) {
            warn!(
                "Could not remove partially extracted '{}': {}",
                target_dir.display(),
                cleanup
            );
        }
        return Err(error);
    }

    Ok(true)
}

fn unpack(archive: &Path, format: ArchiveFormat, target_dir: &Path) -> Result<(), ArchiveError> {
    let file = BufReader::new(File::open(archive)?);
    match format {
        ArchiveFormat::Tar => tar::Archive::new(file).unpack(target_dir)?,
        ArchiveFormat::TarGz => tar::Archive::new(GzDecoder::new(file)).unpack(target_dir)?,
        ArchiveFormat::TarBz2 => tar::Archive::new(BzDecoder::new(file)).unpack(target_dir)?,
        ArchiveFormat::TarXz => tar::Archive::new(XzDecoder::new(file)).unpack(target_dir)?,
        ArchiveFormat::Zip => zip::ZipArchive::new(file)?.extract(target_dir)?,
    }
    Ok(())
}
