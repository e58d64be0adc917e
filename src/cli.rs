//! Module for CLI parsing.

use crate::linker::{LinkConfig, Linker};
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;

/// WebAssembly to JavaScript link-editor.
///
/// Combines a wasm object module with hand-written JavaScript symbol and
/// export files into a single self-contained UMD JavaScript module.
#[derive(Debug, Parser)]
#[clap(name = "js-ld", version = env!("CARGO_PKG_VERSION"))]
pub struct JsLdCommand {
    /// The path of the output JavaScript module.
    #[clap(long, short = 'o', value_name = "OUTPUT")]
    pub output: PathBuf,

    /// A JavaScript file whose exports become the output module's exports.
    #[clap(long = "exports", value_name = "FILE")]
    pub exports: Vec<PathBuf>,

    /// A JavaScript file defining symbols shared with the wasm module.
    #[clap(long = "symbols", value_name = "FILE")]
    pub symbols: Vec<PathBuf>,

    /// A JavaScript file whose top-level declarations are allowed as free
    /// references in the output.
    #[clap(long, value_name = "FILE")]
    pub externs: Option<PathBuf>,

    /// The module name exposed to AMD loaders and browser globals; defaults
    /// to the output file stem.
    #[clap(long, value_name = "NAME")]
    pub name: Option<String>,

    /// The path of the input wasm module.
    #[clap(value_name = "WASM")]
    pub input: PathBuf,
}

impl JsLdCommand {
    /// Executes the application.
    pub fn execute(self) -> Result<()> {
        let module_name = match self.name {
            Some(name) => name,
            None => match self.output.file_stem() {
                Some(stem) => stem.to_string_lossy().into_owned(),
                None => bail!("`{}` has no file stem", self.output.display()),
            },
        };

        let config = LinkConfig {
            wasm: self.input,
            symbols: self.symbols,
            exports: self.exports,
            externs: self.externs,
            module_name,
        };
        log::debug!("configuration:\n{:#?}", config);

        let output = Linker::new(&config).link()?;

        std::fs::write(&self.output, output).with_context(|| {
            format!(
                "failed to write linked module `{output}`",
                output = self.output.display()
            )
        })?;

        println!(
            "linked module `{output}`",
            output = self.output.display()
        );

        Ok(())
    }
}

#[test]
fn verify_cli() {
    use clap::CommandFactory;
    JsLdCommand::command().debug_assert()
}
