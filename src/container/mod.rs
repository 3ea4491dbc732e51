mod builder;
mod codec;
pub mod entry_path;
mod payload;

pub use builder::{BuiltContainer, ContainerBuilder, ContainerError, EntryAddress, PayloadCollision};
pub use codec::{
    CabinetCodec, CodecEntry, Compression, ContainerCodec, ContainerEntryInfo, ExtractionError,
};
pub use payload::{Packaging, PayloadEntry, PayloadSource};
