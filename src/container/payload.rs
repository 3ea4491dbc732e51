use std::{
    fmt,
    fs::File,
    io::{self, Cursor, Read},
};

use bon::Builder;
use camino::Utf8PathBuf;

/// Whether a payload travels inside a container or next to the bundle.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Packaging {
    #[default]
    Embedded,
    External,
}

impl Packaging {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Embedded => "Embedded",
            Self::External => "External",
        }
    }
}

impl fmt::Display for Packaging {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

/// A single file packed into a container.
#[derive(Builder, Clone, Debug, Eq, PartialEq)]
pub struct PayloadEntry {
    #[builder(into)]
    id: String,

    /// Where the payload extracts to, relative to the container's destination.
    #[builder(into)]
    path: String,

    /// Uncompressed size in bytes.
    size: u64,

    /// Expected uppercase hex SHA-256 of the payload's contents.
    #[builder(into)]
    hash: Option<String>,

    #[builder(default)]
    packaging: Packaging,

    #[builder(default = true)]
    compressed: bool,
}

impl PayloadEntry {
    #[inline]
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    #[inline]
    pub fn path(&self) -> &str {
        self.path.as_str()
    }

    #[inline]
    pub const fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    #[inline]
    pub const fn packaging(&self) -> Packaging {
        self.packaging
    }

    #[inline]
    pub const fn is_compressed(&self) -> bool {
        self.compressed
    }
}

/// Where a payload's bytes come from when the container is built.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PayloadSource {
    File(Utf8PathBuf),
    Bytes(Vec<u8>),
}

impl PayloadSource {
    pub fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(match self {
            Self::File(path) => Box::new(File::open(path)?),
            Self::Bytes(bytes) => Box::new(Cursor::new(bytes.as_slice())),
        })
    }
}

impl From<Utf8PathBuf> for PayloadSource {
    fn from(path: Utf8PathBuf) -> Self {
        Self::File(path)
    }
}

impl From<Vec<u8>> for PayloadSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}
