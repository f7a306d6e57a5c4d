use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use md5::Context;
use thiserror::Error;

const CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, Error)]
#[error("failed to fingerprint {}: {source}", .path.display())]
pub struct FingerprintError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Lowercase hex MD5 of a file's bytes, comparable with the `md5` field the
/// disk reports for its files.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn from_hex(hex: &str) -> Self {
        Self(hex.trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn fingerprint_file(path: &Path) -> Result<Fingerprint, FingerprintError> {
    let wrap = |source: io::Error| FingerprintError {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(wrap)?;
    fingerprint_reader(file).map_err(wrap)
}

pub fn fingerprint_reader<R: Read>(mut reader: R) -> io::Result<Fingerprint> {
    let mut ctx = Context::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let read = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        ctx.consume(&buf[..read]);
    }
    Ok(Fingerprint(format!("{:x}", ctx.compute())))
}
