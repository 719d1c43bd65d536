use crate::error::Error;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const READ_CHUNK_SIZE: usize = 64 * 1024; // 64KB

/// Stream a reader through SHA-256 and return the lowercase hex digest.
/// Only one chunk is held in memory at a time.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

pub fn hash_file(path: &Path) -> Result<String, Error> {
    let file = File::open(path).map_err(|source| Error::Checksum {
        path: path.to_path_buf(),
        source,
    })?;
    hash_reader(file).map_err(|source| Error::Checksum {
        path: path.to_path_buf(),
        source,
    })
}

pub fn hash_bytes(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

pub fn checksums_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}
