use derive_more::Display;
use serde::Serialize;

/// The two kinds of container a bundle can carry after its engine.
#[derive(Copy, Clone, Debug, Display, Eq, PartialEq, Hash, Serialize)]
pub enum ContainerKind {
    /// The bootstrapper application container. Always present in practice.
    #[display("UX")]
    Ux,
    /// The optional container holding package payloads shipped inside the bundle.
    #[display("attached")]
    Attached,
}

impl ContainerKind {
    pub const UX_CONTAINER_ID: &str = "WixUXContainer";
    pub const ATTACHED_CONTAINER_ID: &str = "WixAttachedContainer";

    /// Returns the id a container of this kind is given when none is authored.
    #[must_use]
    pub const fn default_id(self) -> &'static str {
        match self {
            Self::Ux => Self::UX_CONTAINER_ID,
            Self::Attached => Self::ATTACHED_CONTAINER_ID,
        }
    }
}

/// A byte range within a bundle file, relative to the start of the file.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ContainerAddress {
    pub offset: u64,
    pub size: u64,
}

impl ContainerAddress {
    #[inline]
    pub const fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// A container with a recorded size of zero is absent.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.size == 0
    }
}
