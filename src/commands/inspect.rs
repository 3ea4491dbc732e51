use std::io::Write;

use camino::Utf8PathBuf;
use clap::{Args, Parser};
use color_eyre::{Result, eyre::WrapErr};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    bundle::{BundleReader, ContainerKind},
    commands::utils::is_valid_file,
    config::EngineOptions,
    container::ContainerEntryInfo,
};

/// Prints the container header of a bundle and the entries of its containers
#[derive(Parser)]
pub struct Inspect {
    /// The bundle to inspect
    #[arg(value_parser = is_valid_file, value_hint = clap::ValueHint::FilePath)]
    bundle: Utf8PathBuf,

    #[command(flatten)]
    output_type: OutputType,

    #[command(flatten)]
    options: EngineOptions,
}

#[derive(Args)]
#[group(multiple = false)]
struct OutputType {
    /// Output the report as JSON
    #[arg(long)]
    json: bool,

    /// Output the report as prettified JSON
    #[arg(long)]
    pretty_json: bool,
}

#[derive(Serialize)]
struct BundleReport {
    bundle_id: Uuid,
    version: u32,
    container_format: u32,
    container_count: u32,
    engine_size: u64,
    header_offset: u64,
    file_length: u64,
    containers: Vec<ContainerReport>,
}

#[derive(Serialize)]
struct ContainerReport {
    id: &'static str,
    kind: ContainerKind,
    offset: u64,
    size: u64,
    entries: Vec<ContainerEntryInfo>,
}

impl Inspect {
    pub fn run(self) -> Result<()> {
        let mut reader = BundleReader::open(&self.bundle)
            .wrap_err_with(|| format!("Failed to open {}", self.bundle))?;
        let codec = self.options.codec();
        let staging_folder = self.options.intermediate_folder_for(&self.bundle);

        let mut containers = Vec::new();
        for kind in [ContainerKind::Ux, ContainerKind::Attached] {
            let address = reader.address(kind);
            if address.is_empty() {
                continue;
            }
            let entries = reader
                .list_container(kind, &codec, &staging_folder)
                .wrap_err_with(|| {
                    format!("Failed to list the {kind} container of {}", self.bundle)
                })?;
            containers.push(ContainerReport {
                id: kind.default_id(),
                kind,
                offset: address.offset,
                size: address.size,
                entries,
            });
        }

        let header = reader.header();
        let report = BundleReport {
            bundle_id: header.bundle_id(),
            version: header.version(),
            container_format: header.container_format(),
            container_count: header.container_count(),
            engine_size: header.engine_size(),
            header_offset: reader.header_offset(),
            file_length: reader.file_length(),
            containers,
        };
        reader.close();

        let mut stdout_lock = anstream::stdout().lock();
        match self.output_type {
            OutputType {
                pretty_json: true, ..
            } => {
                serde_json::to_writer_pretty(&mut stdout_lock, &report)?;
                writeln!(stdout_lock)?;
            }
            OutputType { json: true, .. } => {
                serde_json::to_writer(&mut stdout_lock, &report)?;
                writeln!(stdout_lock)?;
            }
            _ => serde_yaml::to_writer(&mut stdout_lock, &report)?,
        }

        Ok(())
    }
}
