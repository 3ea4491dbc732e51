use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use color_eyre::{Result, eyre::WrapErr};
use owo_colors::OwoColorize;

use crate::{commands::utils::is_valid_file, config::EngineOptions, workflow::extract_bundle};

/// Extracts the containers of a bundle
#[derive(Parser)]
pub struct Extract {
    /// The bundle to extract
    #[arg(value_parser = is_valid_file, value_hint = clap::ValueHint::FilePath)]
    bundle: Utf8PathBuf,

    /// Folder to extract the UX container to
    #[arg(long = "oba", visible_alias = "ux-output", value_hint = clap::ValueHint::DirPath)]
    ux_output: Utf8PathBuf,

    /// Folder to extract the attached container to
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    output: Option<Utf8PathBuf>,

    #[command(flatten)]
    options: EngineOptions,
}

impl Extract {
    pub fn run(self) -> Result<()> {
        let extracted = extract_bundle(
            &self.bundle,
            &self.ux_output,
            self.output.as_deref(),
            &self.options,
        )
        .wrap_err_with(|| format!("Failed to extract {}", self.bundle))?;

        let mut stdout_lock = anstream::stdout().lock();
        writeln!(
            stdout_lock,
            "Extracted {} files from the UX container to {}",
            extracted.ux.len().blue(),
            self.ux_output
        )?;
        if let Some(output) = &self.output {
            writeln!(
                stdout_lock,
                "Extracted {} files from the attached container to {output}",
                extracted.attached.len().blue()
            )?;
        }

        Ok(())
    }
}
