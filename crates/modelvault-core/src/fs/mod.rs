//! Filesystem primitives shared across features.

pub mod atomic;
pub mod digest;

pub use atomic::{copy_preserving_times, publish_dir, replace_file};
pub use digest::{FileDigest, hash_file};
