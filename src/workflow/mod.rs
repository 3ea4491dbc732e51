mod create;
mod extract;
mod inscribe;

use std::io;

pub use create::{BundleLayout, CreatedBundle, create_bundle};
pub use extract::{ExtractedBundle, extract_bundle};
pub use inscribe::{detach_engine, inscribe_bundle, reattach_engine};
use thiserror::Error;

use crate::{bundle::BundleError, container::ContainerError, signing::SigningError};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Bundle(#[from] BundleError),
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, fs};

    use camino::{Utf8Path, Utf8PathBuf};
    use uuid::Uuid;
    use walkdir::WalkDir;

    use super::{
        BundleLayout, WorkflowError, create_bundle, detach_engine, extract_bundle,
        inscribe_bundle, reattach_engine,
    };
    use crate::{
        bundle::{BundleError, BundleReader, ContainerKind, HEADER_SIZE},
        config::EngineOptions,
        container::{ContainerBuilder, PayloadEntry},
        signing::SigningError,
        transfer::{FileTransfer, TransferMode},
    };

    const BUNDLE_ID: Uuid = Uuid::from_u128(0x6F1D_2E3C_4B5A_4978_8695_A4B3_C2D1_E0F9);
    const ENGINE: &[u8] = b"MZ\x90\0engine";

    struct Fixture {
        _temp_dir: tempfile::TempDir,
        root: Utf8PathBuf,
        options: EngineOptions,
    }

    impl Fixture {
        fn new() -> Self {
            let temp_dir = tempfile::tempdir().unwrap();
            let root = Utf8Path::from_path(temp_dir.path()).unwrap().to_path_buf();
            let options = EngineOptions {
                intermediate_folder: Some(root.join("obj")),
                ..EngineOptions::default()
            };
            Self {
                _temp_dir: temp_dir,
                root,
                options,
            }
        }

        fn container(kind: ContainerKind, files: &[(&str, &str)]) -> ContainerBuilder {
            let mut builder = ContainerBuilder::new(kind);
            for (index, (path, data)) in files.iter().enumerate() {
                let entry = PayloadEntry::builder()
                    .id(format!("payload{index}"))
                    .path(*path)
                    .size(data.len() as u64)
                    .build();
                builder.add_payload(entry, data.as_bytes().to_vec()).unwrap();
            }
            builder
        }

        fn create(&self, ux: &[(&str, &str)], attached: &[(&str, &str)]) -> Utf8PathBuf {
            let engine = self.root.join("engine.exe");
            fs::write(&engine, ENGINE).unwrap();
            let output = self.root.join("bundle.exe");

            let layout = BundleLayout {
                ux: Self::container(ContainerKind::Ux, ux),
                attached: (!attached.is_empty())
                    .then(|| Self::container(ContainerKind::Attached, attached)),
                external: Vec::new(),
            };
            create_bundle(&engine, &output, BUNDLE_ID, layout, &self.options).unwrap();
            output
        }
    }

    fn snapshot(folder: &Utf8Path) -> BTreeMap<String, Vec<u8>> {
        WalkDir::new(folder)
            .into_iter()
            .map(Result::unwrap)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| {
                let relative = entry.path().strip_prefix(folder).unwrap();
                (
                    relative.to_string_lossy().replace('\\', "/"),
                    fs::read(entry.path()).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn create_then_extract_single_file() {
        let fixture = Fixture::new();
        let engine = fixture.root.join("engine.exe");
        fs::write(&engine, b"0123456789").unwrap();
        let output = fixture.root.join("bundle.exe");
        let layout = BundleLayout {
            ux: Fixture::container(ContainerKind::Ux, &[("a.txt", "hello")]),
            attached: None,
            external: Vec::new(),
        };

        let created = create_bundle(&engine, &output, BUNDLE_ID, layout, &fixture.options).unwrap();

        let ux_size = created.header.ux_container_size();
        assert!(ux_size > 0);
        assert_eq!(created.header.attached_container_size(), 0);
        assert_eq!(
            fs::metadata(&output).unwrap().len(),
            10 + ux_size + HEADER_SIZE as u64
        );

        let ux_folder = fixture.root.join("ux");
        let extracted = extract_bundle(&output, &ux_folder, None, &fixture.options).unwrap();
        assert_eq!(extracted.ux, [ux_folder.join("a.txt")]);
        assert_eq!(fs::read(ux_folder.join("a.txt")).unwrap(), b"hello");
    }

    #[test]
    fn extraction_is_repeatable() {
        let fixture = Fixture::new();
        let bundle = fixture.create(
            &[("0", "<BurnManifest/>"), (r"ba\ba.dll", "bootstrapper")],
            &[("product.msi", "msi")],
        );

        let first = fixture.root.join("first");
        let second = fixture.root.join("second");
        extract_bundle(&bundle, &first, None, &fixture.options).unwrap();
        extract_bundle(&bundle, &second, None, &fixture.options).unwrap();

        assert_eq!(snapshot(&first), snapshot(&second));
        assert_eq!(snapshot(&first).len(), 2);
    }

    #[test]
    fn extract_both_containers() {
        let fixture = Fixture::new();
        let bundle = fixture.create(&[("0", "manifest")], &[("product.msi", "msi")]);
        let ux_folder = fixture.root.join("ux");
        let attached_folder = fixture.root.join("attached");

        let extracted = extract_bundle(
            &bundle,
            &ux_folder,
            Some(attached_folder.as_path()),
            &fixture.options,
        )
        .unwrap();

        assert_eq!(extracted.header.bundle_id(), BUNDLE_ID);
        assert_eq!(extracted.attached, [attached_folder.join("product.msi")]);
        assert_eq!(fs::read(attached_folder.join("product.msi")).unwrap(), b"msi");
    }

    #[test]
    fn identity_signing_preserves_bundle() {
        let fixture = Fixture::new();
        let bundle = fixture.create(&[("0", "manifest")], &[("product.msi", "msi")]);
        let output = fixture.root.join("signed.exe");

        let identity = |_: &Utf8Path| -> Result<(), SigningError> { Ok(()) };
        inscribe_bundle(&bundle, &output, &identity, &fixture.options).unwrap();

        assert_eq!(fs::read(&output).unwrap(), fs::read(&bundle).unwrap());
        assert_eq!(fs::read_dir(fixture.root.join("obj")).unwrap().count(), 0);
    }

    #[test]
    fn same_size_signature_is_kept() {
        let fixture = Fixture::new();
        let bundle = fixture.create(&[("0", "manifest")], &[]);
        let output = fixture.root.join("signed.exe");

        let signer = |engine: &Utf8Path| -> Result<(), SigningError> {
            let mut bytes = fs::read(engine).unwrap();
            bytes.reverse();
            fs::write(engine, bytes).unwrap();
            Ok(())
        };
        inscribe_bundle(&bundle, &output, &signer, &fixture.options).unwrap();

        let signed = fs::read(&output).unwrap();
        let original = fs::read(&bundle).unwrap();
        let mut reversed = ENGINE.to_vec();
        reversed.reverse();
        assert_eq!(signed.len(), original.len());
        assert_eq!(&signed[..ENGINE.len()], reversed);
        assert_eq!(&signed[ENGINE.len()..], &original[ENGINE.len()..]);
    }

    #[test]
    fn size_changing_signature_fails_without_output() {
        let fixture = Fixture::new();
        let bundle = fixture.create(&[("0", "manifest")], &[]);
        let output = fixture.root.join("signed.exe");

        let signer = |engine: &Utf8Path| -> Result<(), SigningError> {
            let mut bytes = fs::read(engine).unwrap();
            bytes.extend_from_slice(b"signature");
            fs::write(engine, bytes).unwrap();
            Ok(())
        };
        let result = inscribe_bundle(&bundle, &output, &signer, &fixture.options);

        assert!(matches!(
            result,
            Err(WorkflowError::Bundle(
                BundleError::EngineSizeChangedDuringSigning { .. }
            ))
        ));
        assert!(!output.exists());
    }

    #[test]
    fn signer_failure_is_reported() {
        let fixture = Fixture::new();
        let bundle = fixture.create(&[("0", "manifest")], &[]);
        let output = fixture.root.join("signed.exe");

        let signer = |engine: &Utf8Path| -> Result<(), SigningError> {
            Err(SigningError::Rejected {
                engine: engine.to_path_buf(),
                reason: "certificate expired".to_owned(),
            })
        };

        assert!(matches!(
            inscribe_bundle(&bundle, &output, &signer, &fixture.options),
            Err(WorkflowError::Signing(SigningError::Rejected { .. }))
        ));
        assert!(!output.exists());
    }

    #[test]
    fn detach_then_reattach() {
        let fixture = Fixture::new();
        let bundle = fixture.create(&[("0", "manifest")], &[("product.msi", "msi")]);
        let engine = fixture.root.join("detached.exe");
        let output = fixture.root.join("reattached.exe");

        let header = detach_engine(&bundle, &engine, &fixture.options).unwrap();
        assert_eq!(fs::read(&engine).unwrap(), ENGINE);
        assert_eq!(header.engine_size(), ENGINE.len() as u64);

        reattach_engine(&bundle, &engine, &output, &fixture.options).unwrap();
        assert_eq!(fs::read(&output).unwrap(), fs::read(&bundle).unwrap());
    }

    #[test]
    fn later_attached_payload_overwrites_earlier() {
        let fixture = Fixture::new();
        let bundle = fixture.create(
            &[("0", "manifest")],
            &[(r"redist\setup.exe", "FIRST"), ("redist/setup.exe", "SECOND")],
        );
        let attached_folder = fixture.root.join("attached");

        let extracted = extract_bundle(
            &bundle,
            &fixture.root.join("ux"),
            Some(attached_folder.as_path()),
            &fixture.options,
        )
        .unwrap();

        assert_eq!(extracted.attached, [attached_folder.join("redist").join("setup.exe")]);
        assert_eq!(
            fs::read(attached_folder.join("redist").join("setup.exe")).unwrap(),
            b"SECOND"
        );
    }

    #[test]
    fn detach_into_new_folder() {
        let fixture = Fixture::new();
        let bundle = fixture.create(&[("0", "manifest")], &[]);
        let engine = fixture.root.join("signing").join("engine.exe");

        detach_engine(&bundle, &engine, &fixture.options).unwrap();

        assert_eq!(fs::read(&engine).unwrap(), ENGINE);
        assert_eq!(fs::read_dir(fixture.root.join("obj")).unwrap().count(), 0);
    }

    #[test]
    fn external_payloads_are_placed_next_to_bundle() {
        let fixture = Fixture::new();
        let engine = fixture.root.join("engine.exe");
        fs::write(&engine, ENGINE).unwrap();
        let source = fixture.root.join("payload.cab");
        fs::write(&source, b"external").unwrap();
        let output = fixture.root.join("out").join("bundle.exe");
        let destination = fixture.root.join("out").join("payload.cab");

        let layout = BundleLayout {
            ux: Fixture::container(ContainerKind::Ux, &[("0", "manifest")]),
            attached: None,
            external: FileTransfer::plan(&source, &destination, TransferMode::Copy)
                .into_iter()
                .collect(),
        };
        let created = create_bundle(&engine, &output, BUNDLE_ID, layout, &fixture.options).unwrap();

        assert_eq!(created.external.len(), 1);
        assert_eq!(created.external[0].destination(), destination);
        assert_eq!(fs::read(&destination).unwrap(), b"external");
        assert!(BundleReader::open(&output).is_ok());
    }

    #[test]
    fn empty_attached_container_is_omitted() {
        let fixture = Fixture::new();
        let engine = fixture.root.join("engine.exe");
        fs::write(&engine, ENGINE).unwrap();
        let output = fixture.root.join("bundle.exe");
        let layout = BundleLayout {
            ux: Fixture::container(ContainerKind::Ux, &[("0", "manifest")]),
            attached: Some(ContainerBuilder::new(ContainerKind::Attached)),
            external: Vec::new(),
        };

        let created = create_bundle(&engine, &output, BUNDLE_ID, layout, &fixture.options).unwrap();

        assert_eq!(created.header.attached_container_size(), 0);
        assert_eq!(created.header.container_count(), 1);
        let attached_folder = fixture.root.join("attached");
        let extracted = extract_bundle(
            &output,
            &fixture.root.join("ux"),
            Some(attached_folder.as_path()),
            &fixture.options,
        )
        .unwrap();
        assert!(extracted.attached.is_empty());
        assert!(!attached_folder.exists());
    }
}
