mod address;
mod copy;
mod header;
mod reader;
mod writer;

use std::io;

pub use address::{ContainerAddress, ContainerKind};
pub use header::{ContainerHeader, HEADER_SIZE, HeaderError};
pub use reader::BundleReader;
use thiserror::Error;
pub use writer::BundleWriter;
pub(crate) use writer::persist_temp_file;

use crate::container::ExtractionError;

#[derive(Error, Debug)]
pub enum BundleError {
    #[error(transparent)]
    Header(#[from] HeaderError),
    #[error("Failed to extract the {container} container: {source}")]
    ContainerExtractionFailed {
        container: ContainerKind,
        #[source]
        source: ExtractionError,
    },
    #[error("A bundle can only have one attached container")]
    MultipleAttachedContainersUnsupported,
    #[error("The UX container must be appended once, before the attached container")]
    ContainerOutOfOrder,
    #[error(
        "The signed engine is {actual} bytes but the original engine is {expected} bytes. Signing must not change the size of the engine"
    )]
    EngineSizeChangedDuringSigning { expected: u64, actual: u64 },
    #[error("Only {actual} of the engine's {expected} bytes could be read")]
    EngineExtractionIncomplete { expected: u64, actual: u64 },
    #[error("The reattached bundle is {actual} bytes but the original bundle is {expected} bytes")]
    ReattachedLengthMismatch { expected: u64, actual: u64 },
    #[error(transparent)]
    Persist(#[from] tempfile::PersistError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl BundleError {
    pub(crate) fn extraction<E: Into<ExtractionError>>(container: ContainerKind, error: E) -> Self {
        Self::ContainerExtractionFailed {
            container,
            source: error.into(),
        }
    }
}
