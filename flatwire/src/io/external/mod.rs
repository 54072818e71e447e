//! Backends for buffer types from third-party crates.
#[cfg(feature = "bytes")]
mod bytes;
#[cfg(feature = "mmap")]
mod mmap;
