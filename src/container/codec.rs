use std::{
    collections::HashSet,
    fs::{self, File},
    io::{self, Read, Seek, Write},
};

use cab::{Cabinet, CabinetBuilder, CompressionType};
use camino::{Utf8Path, Utf8PathBuf};
use clap::ValueEnum;
use derive_more::Display;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::entry_path::{UnsafeEntryPath, relative_entry_path};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("container is truncated: expected {expected} bytes but only {actual} could be read")]
    Truncated { expected: u64, actual: u64 },
    #[error("refusing to extract unsafe entry: {0}")]
    UnsafeEntryPath(#[from] UnsafeEntryPath),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// How compressible payloads are packed into cabinet folders.
#[derive(Copy, Clone, Debug, Default, Display, Eq, PartialEq, ValueEnum)]
pub enum Compression {
    /// Store every payload uncompressed
    #[display("none")]
    None,
    /// MSZIP (deflate) compression
    #[default]
    #[display("mszip")]
    #[value(name = "mszip")]
    MsZip,
}

/// A payload handed to a codec for encoding, in container order.
pub struct CodecEntry<'source> {
    pub name: String,
    pub compressed: bool,
    pub source: &'source mut dyn Read,
}

/// A file recorded in a container's directory.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ContainerEntryInfo {
    pub name: String,
    pub size: u64,
}

/// Turns an ordered list of payloads into a container's bytes and back.
pub trait ContainerCodec {
    /// Encodes `entries` into `writer` in the order given, returning the writer.
    fn encode<W: Write + Seek>(&self, entries: &mut [CodecEntry<'_>], writer: W) -> io::Result<W>;

    /// Reads the container's directory without decoding any payloads.
    fn list<R: Read + Seek>(&self, reader: R) -> io::Result<Vec<ContainerEntryInfo>>;

    /// Decodes every entry into `destination`, returning the paths written.
    ///
    /// Every entry name is validated before anything is written, so a container holding an
    /// unsafe name leaves `destination` untouched.
    fn decode<R: Read + Seek>(
        &self,
        reader: R,
        destination: &Utf8Path,
    ) -> Result<Vec<Utf8PathBuf>, ExtractionError>;
}

/// Microsoft cabinet containers, the format Burn engines read.
#[derive(Copy, Clone, Debug, Default)]
pub struct CabinetCodec {
    compression: Compression,
}

impl CabinetCodec {
    pub const fn new(compression: Compression) -> Self {
        Self { compression }
    }

    const fn compression_type(self, compressed: bool) -> CompressionType {
        match (self.compression, compressed) {
            (Compression::MsZip, true) => CompressionType::MsZip,
            _ => CompressionType::None,
        }
    }
}

impl ContainerCodec for CabinetCodec {
    fn encode<W: Write + Seek>(&self, entries: &mut [CodecEntry<'_>], writer: W) -> io::Result<W> {
        let mut builder = CabinetBuilder::new();

        // Each run of equally compressed entries shares a folder so entry order is preserved
        for run in entries.chunk_by(|left, right| left.compressed == right.compressed) {
            let folder = builder.add_folder(self.compression_type(run[0].compressed));
            for entry in run {
                folder.add_file(entry.name.as_str());
            }
        }

        let mut cabinet = builder.build(writer)?;
        let mut sources = entries.iter_mut();
        while let Some(mut file_writer) = cabinet.next_file()? {
            let entry = sources.next().ok_or_else(|| {
                io::Error::other("cabinet requested more files than were added")
            })?;
            debug!(name = file_writer.file_name(), "Writing container entry");
            io::copy(&mut entry.source, &mut file_writer)?;
        }

        cabinet.finish()
    }

    fn list<R: Read + Seek>(&self, reader: R) -> io::Result<Vec<ContainerEntryInfo>> {
        let cabinet = Cabinet::new(reader)?;

        Ok(cabinet
            .folder_entries()
            .flat_map(|folder| folder.file_entries())
            .map(|file| ContainerEntryInfo {
                name: file.name().to_owned(),
                size: u64::from(file.uncompressed_size()),
            })
            .collect())
    }

    fn decode<R: Read + Seek>(
        &self,
        reader: R,
        destination: &Utf8Path,
    ) -> Result<Vec<Utf8PathBuf>, ExtractionError> {
        let mut cabinet = Cabinet::new(reader)?;

        // Cabinet files are only addressable by name, so a repeated name is written once
        let mut seen = HashSet::new();
        let names = cabinet
            .folder_entries()
            .flat_map(|folder| folder.file_entries())
            .map(|file| file.name().to_owned())
            .filter(|name| {
                let first = seen.insert(name.clone());
                if !first {
                    warn!(%name, "Skipping repeated container entry");
                }
                first
            })
            .collect::<Vec<_>>();

        let targets = names
            .iter()
            .map(|name| Ok((name, destination.join(relative_entry_path(name)?))))
            .collect::<Result<Vec<_>, UnsafeEntryPath>>()?;

        fs::create_dir_all(destination)?;

        let mut extracted = Vec::with_capacity(targets.len());
        for (name, target) in targets {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = File::create(&target)?;
            io::copy(&mut cabinet.read_file(name)?, &mut file)?;
            debug!(%target, "Extracted container entry");
            extracted.push(target);
        }

        Ok(extracted)
    }
}
