use std::{
    fmt, io,
    io::{Read, Seek, SeekFrom},
};

use derive_more::Display;
use thiserror::Error;
use uuid::Uuid;
use zerocopy::{
    Immutable, IntoBytes, KnownLayout, LittleEndian, TryFromBytes,
    little_endian::{U32, U64},
};

use super::{ContainerAddress, ContainerKind};
use crate::binary::ReadBytesExt;

pub const HEADER_MAGIC: u32 = 0x00F1_4300;

/// The only footer version this engine reads and writes.
pub const SUPPORTED_VERSION: u32 = 1;

/// Containers are Microsoft cabinet files.
pub const CABINET_CONTAINER_FORMAT: u32 = 1;

pub const HEADER_SIZE: usize = size_of::<ContainerHeader>();

// The checksum covers every byte before it
const CHECKSUM_OFFSET: usize = HEADER_SIZE - size_of::<U32>();

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("Container header does not begin with the bundle magic number")]
    InvalidBundleFormat,
    #[error("Unsupported bundle version {0} (only version {SUPPORTED_VERSION} is supported)")]
    UnsupportedBundleVersion(u32),
    #[error("Container header is corrupt: {0}")]
    CorruptBundleHeader(Corruption),
    #[error("No container header found at the end of the file")]
    BundleHeaderNotFound,
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Display, Eq, PartialEq)]
pub enum Corruption {
    #[display("checksum {expected:#010X} does not match computed checksum {actual:#010X}")]
    ChecksumMismatch { expected: u32, actual: u32 },
    #[display("container format {_0} is not a known format")]
    UnknownContainerFormat(u32),
    #[display("header records {recorded} containers but the container sizes imply {expected}")]
    ContainerCount { recorded: u32, expected: u32 },
    #[display("container sizes overflow a 64-bit offset")]
    SizeOverflow,
    #[display("header describes {declared} bytes but the file is only {actual} bytes long")]
    ExceedsFileLength { declared: u64, actual: u64 },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, TryFromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(u32)]
enum HeaderMagic {
    F14300 = HEADER_MAGIC.to_le(),
}

/// The fixed-layout footer that closes every bundle.
///
/// ```text
/// [engine][UX container][attached container][ContainerHeader]
/// ```
///
/// All addresses are derived from the recorded sizes, so the footer can be found without
/// knowing how large the engine is.
#[derive(Copy, Clone, Eq, PartialEq, TryFromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct ContainerHeader {
    magic: HeaderMagic,
    version: U32,
    bundle_id: uuid::Bytes,
    original_checksum: U32,
    original_signature_offset: U32,
    original_signature_size: U32,
    container_format: U32,
    container_count: U32,
    engine_size: U64,
    ux_container_size: U64,
    attached_container_size: U64,
    checksum: U32,
}

impl ContainerHeader {
    pub fn new(
        bundle_id: Uuid,
        engine_size: u64,
        ux_container_size: u64,
        attached_container_size: u64,
    ) -> Self {
        let mut header = Self {
            magic: HeaderMagic::F14300,
            version: U32::new(SUPPORTED_VERSION),
            bundle_id: bundle_id.into_bytes(),
            original_checksum: U32::ZERO,
            original_signature_offset: U32::ZERO,
            original_signature_size: U32::ZERO,
            container_format: U32::new(CABINET_CONTAINER_FORMAT),
            container_count: U32::new(expected_container_count(
                ux_container_size,
                attached_container_size,
            )),
            engine_size: U64::new(engine_size),
            ux_container_size: U64::new(ux_container_size),
            attached_container_size: U64::new(attached_container_size),
            checksum: U32::ZERO,
        };
        header.checksum = U32::new(header.compute_checksum());
        header
    }

    /// Parses the footer occupying the last [`HEADER_SIZE`] bytes of `buffer`, validating it
    /// against the length of the file it was read from.
    pub fn parse(buffer: &[u8], file_length: u64) -> Result<Self, HeaderError> {
        let footer = buffer
            .len()
            .checked_sub(HEADER_SIZE)
            .map(|start| &buffer[start..])
            .ok_or(HeaderError::BundleHeaderNotFound)?;

        // The magic is the only field with a validity constraint on its bytes
        let header =
            Self::try_read_from_bytes(footer).map_err(|_| HeaderError::InvalidBundleFormat)?;

        if header.version() != SUPPORTED_VERSION {
            return Err(HeaderError::UnsupportedBundleVersion(header.version()));
        }

        header.validate(file_length)?;

        Ok(header)
    }

    fn validate(&self, file_length: u64) -> Result<(), HeaderError> {
        let actual = self.compute_checksum();
        if self.checksum() != actual {
            return Err(HeaderError::CorruptBundleHeader(
                Corruption::ChecksumMismatch {
                    expected: self.checksum(),
                    actual,
                },
            ));
        }

        if self.container_format() != CABINET_CONTAINER_FORMAT {
            return Err(HeaderError::CorruptBundleHeader(
                Corruption::UnknownContainerFormat(self.container_format()),
            ));
        }

        let expected =
            expected_container_count(self.ux_container_size(), self.attached_container_size());
        if self.container_count() != expected {
            return Err(HeaderError::CorruptBundleHeader(
                Corruption::ContainerCount {
                    recorded: self.container_count(),
                    expected,
                },
            ));
        }

        let declared = self
            .total_size()
            .ok_or(HeaderError::CorruptBundleHeader(Corruption::SizeOverflow))?;
        if declared > file_length {
            return Err(HeaderError::CorruptBundleHeader(
                Corruption::ExceedsFileLength {
                    declared,
                    actual: file_length,
                },
            ));
        }

        Ok(())
    }

    /// Finds and parses the footer at the end of `reader`.
    ///
    /// Returns the file offset the footer starts at alongside the parsed header.
    pub fn locate<R: Read + Seek>(reader: &mut R) -> Result<(u64, Self), HeaderError> {
        let file_length = reader.seek(SeekFrom::End(0))?;

        let Some(header_offset) = file_length.checked_sub(HEADER_SIZE as u64) else {
            return Err(HeaderError::BundleHeaderNotFound);
        };

        reader.seek(SeekFrom::Start(header_offset))?;
        let window = reader.read_t::<[u8; HEADER_SIZE]>()?;

        if window.as_slice().read_u32::<LittleEndian>()? != HEADER_MAGIC {
            return Err(HeaderError::BundleHeaderNotFound);
        }

        let header = Self::parse(&window, file_length)?;

        Ok((header_offset, header))
    }

    /// Serializes the header into its on-disk layout.
    #[inline]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0; HEADER_SIZE];
        bytes.copy_from_slice(self.as_bytes());
        bytes
    }

    fn compute_checksum(&self) -> u32 {
        crc32fast::hash(&self.as_bytes()[..CHECKSUM_OFFSET])
    }

    /// The number of bytes the engine, containers and footer occupy together, or [`None`] if
    /// the recorded sizes overflow.
    pub fn total_size(&self) -> Option<u64> {
        self.engine_size()
            .checked_add(self.ux_container_size())?
            .checked_add(self.attached_container_size())?
            .checked_add(HEADER_SIZE as u64)
    }

    pub const fn address(&self, kind: ContainerKind) -> ContainerAddress {
        let engine_size = self.engine_size();
        let ux_container_size = self.ux_container_size();
        match kind {
            ContainerKind::Ux => ContainerAddress::new(engine_size, ux_container_size),
            ContainerKind::Attached => ContainerAddress::new(
                engine_size.saturating_add(ux_container_size),
                self.attached_container_size(),
            ),
        }
    }

    #[inline]
    pub const fn version(&self) -> u32 {
        self.version.get()
    }

    #[inline]
    pub const fn bundle_id(&self) -> Uuid {
        Uuid::from_bytes(self.bundle_id)
    }

    #[inline]
    pub const fn original_checksum(&self) -> u32 {
        self.original_checksum.get()
    }

    #[inline]
    pub const fn original_signature_offset(&self) -> u32 {
        self.original_signature_offset.get()
    }

    #[inline]
    pub const fn original_signature_size(&self) -> u32 {
        self.original_signature_size.get()
    }

    #[inline]
    pub const fn container_format(&self) -> u32 {
        self.container_format.get()
    }

    #[inline]
    pub const fn container_count(&self) -> u32 {
        self.container_count.get()
    }

    #[inline]
    pub const fn engine_size(&self) -> u64 {
        self.engine_size.get()
    }

    #[inline]
    pub const fn ux_container_size(&self) -> u64 {
        self.ux_container_size.get()
    }

    #[inline]
    pub const fn attached_container_size(&self) -> u64 {
        self.attached_container_size.get()
    }

    #[inline]
    pub const fn checksum(&self) -> u32 {
        self.checksum.get()
    }
}

const fn expected_container_count(ux_container_size: u64, attached_container_size: u64) -> u32 {
    if ux_container_size == 0 {
        0
    } else if attached_container_size == 0 {
        1
    } else {
        2
    }
}

impl fmt::Debug for ContainerHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerHeader")
            .field("Version", &self.version())
            .field("BundleId", &self.bundle_id())
            .field("OriginalChecksum", &self.original_checksum())
            .field("OriginalSignatureOffset", &self.original_signature_offset())
            .field("OriginalSignatureSize", &self.original_signature_size())
            .field("ContainerFormat", &self.container_format())
            .field("ContainerCount", &self.container_count())
            .field("EngineSize", &self.engine_size())
            .field("UxContainerSize", &self.ux_container_size())
            .field("AttachedContainerSize", &self.attached_container_size())
            .field("Checksum", &format_args!("{:#010X}", self.checksum()))
            .finish()
    }
}
