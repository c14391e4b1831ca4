//! Archive extraction.
//!
//! Downloads are always staged as `<package>-<version>.zip`, but servers may
//! publish tarballs too, so the format is sniffed from the first bytes
//! rather than the file name.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;

use thiserror::Error;
use zip::ZipArchive;
use zstd::stream::Decoder as ZstdDecoder;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("unsupported archive format")]
    UnsupportedFormat,

    #[error("archive error: {0}")]
    Archive(String),
}

/// Formats recognised by [`ArchiveExtractor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
    TarZst,
    Tar,
}

impl ArchiveFormat {
    /// Identify an archive from its leading bytes.
    pub fn sniff(header: &[u8]) -> Option<Self> {
        const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

        if header.starts_with(b"PK\x03\x04") || header.starts_with(b"PK\x05\x06") {
            Some(Self::Zip)
        } else if header.starts_with(&[0x1f, 0x8b]) {
            Some(Self::TarGz)
        } else if header.starts_with(&ZSTD_MAGIC) {
            Some(Self::TarZst)
        } else if header.len() >= 262 && &header[257..262] == b"ustar" {
            Some(Self::Tar)
        } else {
            None
        }
    }
}

/// Unpacks an archive into a directory.
pub trait Archiver: Send + Sync {
    /// Extract `archive` into `dest`, creating `dest` if needed.
    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ExtractError>;
}

/// [`Archiver`] for zip, tar, tar.gz and tar.zst.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveExtractor;

impl Archiver for ArchiveExtractor {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ExtractError> {
        let mut header = Vec::with_capacity(512);
        File::open(archive)?.take(512).read_to_end(&mut header)?;

        match ArchiveFormat::sniff(&header).ok_or(ExtractError::UnsupportedFormat)? {
            ArchiveFormat::Zip => extract_zip(archive, dest),
            ArchiveFormat::TarGz => {
                let reader = BufReader::new(File::open(archive)?);
                extract_tar(flate2::read::GzDecoder::new(reader), dest)
            }
            ArchiveFormat::TarZst => {
                let reader = BufReader::new(File::open(archive)?);
                extract_tar(ZstdDecoder::new(reader)?, dest)
            }
            ArchiveFormat::Tar => extract_tar(BufReader::new(File::open(archive)?), dest),
        }
    }
}

/// Extract a tar stream. Entries that would land outside `dest` are
/// rejected by `tar` itself.
fn extract_tar<R: Read>(reader: R, dest: &Path) -> Result<(), ExtractError> {
    fs::create_dir_all(dest)?;
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.unpack(dest)?;
    Ok(())
}

/// Extract a zip archive, keeping directory entries and unix modes.
fn extract_zip(archive_path: &Path, dest: &Path) -> Result<(), ExtractError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| ExtractError::Archive(e.to_string()))?;

    fs::create_dir_all(dest)?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ExtractError::Archive(e.to_string()))?;

        // Zip Slip: skip names that escape the destination.
        let Some(relative) = entry.enclosed_name() else {
            continue;
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target)?;
            io::copy(&mut entry, &mut out)?;
        }

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(mode))?;
        }
    }

    Ok(())
}
