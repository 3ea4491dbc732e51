use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use color_eyre::{Result, eyre::WrapErr};
use owo_colors::OwoColorize;

use crate::{
    commands::utils::is_valid_file,
    config::EngineOptions,
    signing::SignTool,
    workflow::{detach_engine, inscribe_bundle, reattach_engine},
};

/// Detaches a bundle's engine for signing or reattaches its containers to a signed engine
///
/// Without --engine or --sign-with, the engine is written to the output so it can be signed.
/// Signing must not change the size of the engine.
#[derive(Parser)]
pub struct Inscribe {
    /// The original bundle
    #[arg(value_parser = is_valid_file, value_hint = clap::ValueHint::FilePath)]
    bundle: Utf8PathBuf,

    /// Where the detached engine or the inscribed bundle is written
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    output: Utf8PathBuf,

    /// A signed engine to reattach the bundle's containers to
    #[arg(
        short,
        long,
        value_parser = is_valid_file,
        conflicts_with = "sign_with",
        value_hint = clap::ValueHint::FilePath
    )]
    engine: Option<Utf8PathBuf>,

    /// A program that signs the engine in place, given the engine's path as its last argument
    #[arg(long, value_hint = clap::ValueHint::ExecutablePath)]
    sign_with: Option<Utf8PathBuf>,

    /// An argument passed to the signing program before the engine's path
    #[arg(long = "sign-arg", requires = "sign_with", allow_hyphen_values = true)]
    sign_args: Vec<String>,

    #[command(flatten)]
    options: EngineOptions,
}

impl Inscribe {
    pub fn run(self) -> Result<()> {
        let mut stdout_lock = anstream::stdout().lock();

        match (self.engine, self.sign_with) {
            (Some(engine), _) => {
                reattach_engine(&self.bundle, &engine, &self.output, &self.options)
                    .wrap_err_with(|| {
                        format!("Failed to reattach the containers of {} to {engine}", self.bundle)
                    })?;
                writeln!(stdout_lock, "Wrote inscribed bundle to {}", self.output.green())?;
            }
            (None, Some(program)) => {
                let sign_tool = SignTool::new(program, self.sign_args);
                inscribe_bundle(&self.bundle, &self.output, &sign_tool, &self.options)
                    .wrap_err_with(|| format!("Failed to inscribe {}", self.bundle))?;
                writeln!(stdout_lock, "Wrote inscribed bundle to {}", self.output.green())?;
            }
            (None, None) => {
                let header = detach_engine(&self.bundle, &self.output, &self.options)
                    .wrap_err_with(|| format!("Failed to detach the engine of {}", self.bundle))?;
                writeln!(
                    stdout_lock,
                    "Wrote {} byte engine to {}",
                    header.engine_size().blue(),
                    self.output.green()
                )?;
            }
        }

        Ok(())
    }
}
