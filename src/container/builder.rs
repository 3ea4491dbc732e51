use std::{
    collections::{HashMap, HashSet, hash_map::Entry},
    io::{self, Read, Seek, SeekFrom, Write},
};

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{
    codec::{CodecEntry, ContainerCodec},
    entry_path::{UnsafeEntryPath, cabinet_entry_name, collision_key},
    payload::{Packaging, PayloadEntry, PayloadSource},
};
use crate::bundle::ContainerKind;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error(transparent)]
    PayloadCollision(#[from] PayloadCollision),
    #[error("Payload {id} is external and cannot be added to a container")]
    NotEmbedded { id: String },
    #[error("Payload {id} has an invalid path: {source}")]
    InvalidPayloadPath {
        id: String,
        #[source]
        source: UnsafeEntryPath,
    },
    #[error("Payload {id} is {size} bytes, larger than a cabinet entry can hold")]
    PayloadTooLarge { id: String, size: u64 },
    #[error("Payload {id} was declared as {declared} bytes but {actual} bytes were read")]
    PayloadSizeMismatch {
        id: String,
        declared: u64,
        actual: u64,
    },
    #[error("Payload {id} has SHA-256 {actual} but {expected} was expected")]
    PayloadHashMismatch {
        id: String,
        expected: String,
        actual: String,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Two payloads in one container that extract to the same file.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error(
    "Payload {id} in container {container} extracts to {path}, which payload {other_id} already uses"
)]
pub struct PayloadCollision {
    pub container: String,
    pub path: String,
    pub id: String,
    /// The earlier payload this one replaces.
    pub other_id: String,
}

/// Where a payload landed inside a built container.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct EntryAddress {
    pub id: String,
    /// The name the payload is stored under.
    pub name: String,
    /// Index of the cabinet folder holding the payload.
    pub folder: usize,
    /// Offset of the payload within its folder's uncompressed data.
    pub offset: u64,
    pub size: u64,
    pub sha256: String,
}

pub struct BuiltContainer<W> {
    pub writer: W,
    /// Number of bytes the container occupies in `writer`. Zero if the container had no
    /// payloads.
    pub size: u64,
    pub entries: Vec<EntryAddress>,
    /// Tolerated collisions, reported for containers other than the UX container.
    pub collisions: Vec<PayloadCollision>,
}

/// Collects payloads for one container, in layout order.
pub struct ContainerBuilder {
    id: String,
    kind: ContainerKind,
    payloads: Vec<(PayloadEntry, PayloadSource)>,
}

impl ContainerBuilder {
    pub fn new(kind: ContainerKind) -> Self {
        Self::with_id(kind, kind.default_id())
    }

    pub fn with_id<S: Into<String>>(kind: ContainerKind, id: S) -> Self {
        Self {
            id: id.into(),
            kind,
            payloads: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub const fn kind(&self) -> ContainerKind {
        self.kind
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// Appends a payload. The order payloads are added in is the order they are laid out in.
    pub fn add_payload<S: Into<PayloadSource>>(
        &mut self,
        entry: PayloadEntry,
        source: S,
    ) -> Result<(), ContainerError> {
        if entry.packaging() == Packaging::External {
            return Err(ContainerError::NotEmbedded {
                id: entry.id().to_owned(),
            });
        }

        if let Err(source) = cabinet_entry_name(entry.path()) {
            return Err(ContainerError::InvalidPayloadPath {
                id: entry.id().to_owned(),
                source,
            });
        }

        if entry.size() > u64::from(u32::MAX) {
            return Err(ContainerError::PayloadTooLarge {
                id: entry.id().to_owned(),
                size: entry.size(),
            });
        }

        self.payloads.push((entry, source.into()));
        Ok(())
    }

    /// Checks every payload's destination against the ones before it.
    ///
    /// A collision in the UX container is an error. Elsewhere it is returned to be reported as
    /// a warning, and the index of the payload it replaces is returned so the later payload is
    /// the one that gets extracted.
    fn find_collisions(
        &self,
    ) -> Result<(Vec<PayloadCollision>, HashSet<usize>), ContainerError> {
        let mut claimed = HashMap::<String, usize>::with_capacity(self.payloads.len());
        let mut collisions = Vec::new();
        let mut replaced = HashSet::new();

        for (index, (entry, _)) in self.payloads.iter().enumerate() {
            let key = collision_key(entry.path()).map_err(|source| {
                ContainerError::InvalidPayloadPath {
                    id: entry.id().to_owned(),
                    source,
                }
            })?;

            match claimed.entry(key) {
                Entry::Vacant(vacant) => {
                    vacant.insert(index);
                }
                Entry::Occupied(mut occupied) => {
                    let previous = occupied.insert(index);
                    let collision = PayloadCollision {
                        container: self.id.clone(),
                        path: entry.path().to_owned(),
                        id: entry.id().to_owned(),
                        other_id: self.payloads[previous].0.id().to_owned(),
                    };

                    if self.kind == ContainerKind::Ux {
                        return Err(collision.into());
                    }

                    warn!("{collision}. The file will be overwritten");
                    collisions.push(collision);
                    replaced.insert(previous);
                }
            }
        }

        Ok((collisions, replaced))
    }

    /// Encodes every payload into `writer` through `codec`.
    ///
    /// `writer` must be empty: cabinet offsets are absolute within the stream they are written
    /// to.
    pub fn build<C, W>(self, codec: &C, writer: W) -> Result<BuiltContainer<W>, ContainerError>
    where
        C: ContainerCodec,
        W: Write + Seek,
    {
        let (collisions, replaced) = self.find_collisions()?;
        let Self { id, kind, payloads } = self;
        let payloads = payloads
            .into_iter()
            .enumerate()
            .filter(|(index, _)| !replaced.contains(index))
            .map(|(_, payload)| payload)
            .collect::<Vec<_>>();

        if payloads.is_empty() {
            warn!(container = %id, "Container has no payloads and will be omitted");
            return Ok(BuiltContainer {
                writer,
                size: 0,
                entries: Vec::new(),
                collisions,
            });
        }

        let mut sources = payloads
            .iter()
            .map(|(_, source)| source.open().map(HashingReader::new))
            .collect::<io::Result<Vec<_>>>()?;

        let mut codec_entries = payloads
            .iter()
            .zip(&mut sources)
            .map(|((entry, _), source)| {
                Ok(CodecEntry {
                    name: cabinet_entry_name(entry.path()).map_err(|error| {
                        ContainerError::InvalidPayloadPath {
                            id: entry.id().to_owned(),
                            source: error,
                        }
                    })?,
                    compressed: entry.is_compressed(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, ContainerError>>()?;

        let mut writer = codec.encode(&mut codec_entries, writer)?;
        let names = codec_entries
            .into_iter()
            .map(|codec_entry| codec_entry.name)
            .collect::<Vec<_>>();
        let size = writer.seek(SeekFrom::End(0))?;

        let mut entries = Vec::with_capacity(payloads.len());
        let mut folder = 0;
        let mut offset = 0;
        let mut previous_compressed = None;
        for (((entry, _), source), name) in payloads.iter().zip(sources).zip(names) {
            // Folders change wherever compression does, restarting the uncompressed offset
            if previous_compressed.is_some_and(|compressed| compressed != entry.is_compressed())
            {
                folder += 1;
                offset = 0;
            }
            previous_compressed = Some(entry.is_compressed());

            let (payload_size, sha256) = source.finish();
            if payload_size != entry.size() {
                return Err(ContainerError::PayloadSizeMismatch {
                    id: entry.id().to_owned(),
                    declared: entry.size(),
                    actual: payload_size,
                });
            }
            if let Some(expected) = entry.hash() {
                if !expected.eq_ignore_ascii_case(&sha256) {
                    return Err(ContainerError::PayloadHashMismatch {
                        id: entry.id().to_owned(),
                        expected: expected.to_owned(),
                        actual: sha256,
                    });
                }
            }

            entries.push(EntryAddress {
                id: entry.id().to_owned(),
                name,
                folder,
                offset,
                size: payload_size,
                sha256,
            });
            offset += payload_size;
        }

        info!(
            container = %id,
            payloads = entries.len(),
            size,
            "Built {kind} container"
        );
        debug!(?entries);

        Ok(BuiltContainer {
            writer,
            size,
            entries,
            collisions,
        })
    }
}

/// Hashes and counts the bytes read through it.
struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
    bytes_read: u64,
}

impl<R: Read> HashingReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            bytes_read: 0,
        }
    }

    fn finish(self) -> (u64, String) {
        (
            self.bytes_read,
            base16ct::upper::encode_string(&self.hasher.finalize()),
        )
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.hasher.update(&buf[..read]);
        self.bytes_read += read as u64;
        Ok(read)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rstest::rstest;
    use sha2::{Digest, Sha256};

    use super::{ContainerBuilder, ContainerError, PayloadCollision};
    use crate::{
        bundle::ContainerKind,
        container::{CabinetCodec, ContainerCodec, Packaging, PayloadEntry},
    };

    fn entry(id: &str, path: &str, data: &[u8]) -> PayloadEntry {
        PayloadEntry::builder()
            .id(id)
            .path(path)
            .size(data.len() as u64)
            .build()
    }

    #[test]
    fn entries_keep_append_order_and_offsets() {
        let mut builder = ContainerBuilder::new(ContainerKind::Ux);
        builder
            .add_payload(entry("manifest", "0", b"<BurnManifest/>"), b"<BurnManifest/>".to_vec())
            .unwrap();
        builder
            .add_payload(entry("ba", "ba.dll", b"MZ ba"), b"MZ ba".to_vec())
            .unwrap();
        builder
            .add_payload(
                PayloadEntry::builder()
                    .id("thm")
                    .path("thm.xml")
                    .size(5)
                    .compressed(false)
                    .build(),
                b"<Thm>".to_vec(),
            )
            .unwrap();

        let built = builder
            .build(&CabinetCodec::default(), Cursor::new(Vec::new()))
            .unwrap();

        let ids = built.entries.iter().map(|entry| entry.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["manifest", "ba", "thm"]);
        assert_eq!(
            built
                .entries
                .iter()
                .map(|entry| (entry.folder, entry.offset))
                .collect::<Vec<_>>(),
            [(0, 0), (0, 15), (1, 0)]
        );
        assert_eq!(built.size, built.writer.get_ref().len() as u64);

        let listed = CabinetCodec::default()
            .list(Cursor::new(built.writer.into_inner()))
            .unwrap();
        assert_eq!(
            listed.iter().map(|entry| entry.name.as_str()).collect::<Vec<_>>(),
            ["0", "ba.dll", "thm.xml"]
        );
    }

    #[test]
    fn hashes_are_reported() {
        let mut builder = ContainerBuilder::new(ContainerKind::Attached);
        builder
            .add_payload(entry("a", "a.txt", b"hello"), b"hello".to_vec())
            .unwrap();

        let built = builder
            .build(&CabinetCodec::default(), Cursor::new(Vec::new()))
            .unwrap();

        assert_eq!(
            built.entries[0].sha256,
            base16ct::upper::encode_string(&Sha256::digest(b"hello"))
        );
    }

    #[test]
    fn hash_mismatch() {
        let mut builder = ContainerBuilder::new(ContainerKind::Attached);
        builder
            .add_payload(
                PayloadEntry::builder()
                    .id("a")
                    .path("a.txt")
                    .size(5)
                    .hash("00")
                    .build(),
                b"hello".to_vec(),
            )
            .unwrap();

        assert!(matches!(
            builder.build(&CabinetCodec::default(), Cursor::new(Vec::new())),
            Err(ContainerError::PayloadHashMismatch { .. })
        ));
    }

    #[test]
    fn size_mismatch() {
        let mut builder = ContainerBuilder::new(ContainerKind::Ux);
        builder
            .add_payload(entry("a", "a.txt", b"four"), b"hello".to_vec())
            .unwrap();

        assert!(matches!(
            builder.build(&CabinetCodec::default(), Cursor::new(Vec::new())),
            Err(ContainerError::PayloadSizeMismatch {
                declared: 4,
                actual: 5,
                ..
            })
        ));
    }

    #[test]
    fn ux_collision_is_an_error() {
        let mut builder = ContainerBuilder::new(ContainerKind::Ux);
        builder
            .add_payload(entry("first", "License.rtf", b"a"), b"a".to_vec())
            .unwrap();
        builder
            .add_payload(entry("second", "license.RTF", b"b"), b"b".to_vec())
            .unwrap();

        let Err(ContainerError::PayloadCollision(collision)) =
            builder.build(&CabinetCodec::default(), Cursor::new(Vec::new()))
        else {
            panic!("expected a payload collision");
        };

        assert_eq!(
            collision,
            PayloadCollision {
                container: ContainerKind::UX_CONTAINER_ID.to_owned(),
                path: "license.RTF".to_owned(),
                id: "second".to_owned(),
                other_id: "first".to_owned(),
            }
        );
    }

    #[test]
    fn attached_collision_is_a_warning() {
        let mut builder = ContainerBuilder::new(ContainerKind::Attached);
        builder
            .add_payload(entry("first", r"redist\setup.exe", b"a"), b"a".to_vec())
            .unwrap();
        builder
            .add_payload(entry("second", "redist/setup.exe", b"b"), b"b".to_vec())
            .unwrap();

        let built = builder
            .build(&CabinetCodec::default(), Cursor::new(Vec::new()))
            .unwrap();

        assert_eq!(built.collisions.len(), 1);
        assert_eq!(built.collisions[0].other_id, "first");
        assert_eq!(
            built.entries.iter().map(|entry| entry.id.as_str()).collect::<Vec<_>>(),
            ["second"]
        );
    }

    #[test]
    fn empty_container_has_no_bytes() {
        let built = ContainerBuilder::new(ContainerKind::Attached)
            .build(&CabinetCodec::default(), Cursor::new(Vec::new()))
            .unwrap();

        assert_eq!(built.size, 0);
        assert!(built.writer.get_ref().is_empty());
    }

    #[rstest]
    #[case("../escape.dll")]
    #[case("/absolute.dll")]
    #[case("")]
    fn invalid_paths_are_rejected(#[case] path: &str) {
        let mut builder = ContainerBuilder::new(ContainerKind::Ux);

        assert!(matches!(
            builder.add_payload(entry("bad", path, b""), Vec::new()),
            Err(ContainerError::InvalidPayloadPath { .. })
        ));
        assert!(builder.is_empty());
    }

    #[test]
    fn external_payloads_are_rejected() {
        let mut builder = ContainerBuilder::new(ContainerKind::Attached);
        let external = PayloadEntry::builder()
            .id("download")
            .path("download.msi")
            .size(0)
            .packaging(Packaging::External)
            .build();

        assert!(matches!(
            builder.add_payload(external, Vec::new()),
            Err(ContainerError::NotEmbedded { .. })
        ));
    }

    #[test]
    fn oversized_payloads_are_rejected() {
        let mut builder = ContainerBuilder::new(ContainerKind::Attached);
        let huge = PayloadEntry::builder()
            .id("huge")
            .path("huge.bin")
            .size(u64::from(u32::MAX) + 1)
            .build();

        assert!(matches!(
            builder.add_payload(huge, Vec::new()),
            Err(ContainerError::PayloadTooLarge { .. })
        ));
    }
}
