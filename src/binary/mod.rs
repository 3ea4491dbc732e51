//! Fixed-width little-endian helpers over byte streams and buffers.

mod read;
mod write;

pub use read::ReadBytesExt;
pub use write::WriteBytesExt;
