pub mod sha256;

pub use sha256::{checksums_match, hash_bytes, hash_file, hash_reader};
