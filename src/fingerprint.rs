//! Content fingerprinting
//!
//! Derives a stable hex digest for a regular file, used for duplicate
//! detection and move tracking. Small files are hashed whole; large files
//! are sampled at three fixed offsets with the file size mixed in as a
//! tie-breaker. Directories and unreadable files get an empty fingerprint,
//! which excludes them from move detection.

use std::fmt;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::str::FromStr;

use digest::Digest;

use crate::error::{Result, TmsuError};

/// Files up to this size are hashed in full.
const MAX_WHOLE_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// Sample size taken at the start, middle and end of large files.
const SLAB_SIZE: u64 = 500 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    #[default]
    Sha256,
    Sha1,
    Md5,
    Blake2b,
    None,
}

impl FromStr for Algorithm {
    type Err = TmsuError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SHA256" => Ok(Algorithm::Sha256),
            "SHA1" => Ok(Algorithm::Sha1),
            "MD5" => Ok(Algorithm::Md5),
            "BLAKE2b" => Ok(Algorithm::Blake2b),
            "none" => Ok(Algorithm::None),
            _ => Err(TmsuError::InvalidName(format!(
                "unsupported fingerprint algorithm '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Algorithm::Sha256 => "SHA256",
            Algorithm::Sha1 => "SHA1",
            Algorithm::Md5 => "MD5",
            Algorithm::Blake2b => "BLAKE2b",
            Algorithm::None => "none",
        };
        f.write_str(name)
    }
}

/// Fingerprint the file at `path`.
///
/// Returns an empty string for directories, symlinks, special files and
/// files that cannot be read; none of these is an error.
pub fn create(path: &Path, algorithm: Algorithm) -> Result<String> {
    if algorithm == Algorithm::None {
        return Ok(String::new());
    }

    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::debug!("{}: cannot stat for fingerprinting: {}", path.display(), e);
            return Ok(String::new());
        }
    };
    if !metadata.is_file() {
        return Ok(String::new());
    }

    let result = match algorithm {
        Algorithm::Sha256 => digest_file::<sha2::Sha256>(path, metadata.len()),
        Algorithm::Sha1 => digest_file::<sha1::Sha1>(path, metadata.len()),
        Algorithm::Md5 => digest_file::<md5::Md5>(path, metadata.len()),
        Algorithm::Blake2b => digest_file::<blake2::Blake2b512>(path, metadata.len()),
        Algorithm::None => unreachable!(),
    };

    match result {
        Ok(digest) => Ok(digest),
        Err(e) => {
            tracing::debug!("{}: cannot read for fingerprinting: {}", path.display(), e);
            Ok(String::new())
        }
    }
}

fn digest_file<D: Digest>(path: &Path, size: u64) -> io::Result<String> {
    let mut file = File::open(path)?;

    if size > MAX_WHOLE_FILE_SIZE {
        sampled_digest::<D>(&mut file, size)
    } else {
        whole_digest::<D>(&mut file)
    }
}

fn whole_digest<D: Digest>(file: &mut File) -> io::Result<String> {
    let mut hasher = D::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(to_hex(&hasher.finalize()))
}

/// Hash three slabs at the start, middle and end of the file, then the
/// little-endian size as a tie-breaker for same-sampled files.
fn sampled_digest<D: Digest>(file: &mut File, size: u64) -> io::Result<String> {
    let mut hasher = D::new();
    let mut buffer = vec![0u8; SLAB_SIZE as usize];

    let offsets = [0, size / 2 - SLAB_SIZE / 2, size - SLAB_SIZE];
    for offset in offsets {
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buffer)?;
        hasher.update(&buffer);
    }
    hasher.update(size.to_le_bytes());

    Ok(to_hex(&hasher.finalize()))
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
