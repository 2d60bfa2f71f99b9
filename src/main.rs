//! Command-line inspector and splitter for EDI transmission files.
//!
//! `edimux inspect` prints one JSON summary per interchange; `edimux
//! split` writes each interchange's exact bytes to its own file. A file
//! argument of `-` reads standard input.

use std::{
    fs::File,
    io::{self, Read},
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use edimux::{interchange::Interchanges, metadata::Metadata, syntax::SyntaxKind};
use serde::Serialize;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print one JSON summary line per interchange
    Inspect {
        /// Input file, or `-` for standard input
        file: PathBuf,
    },
    /// Write each interchange to its own file
    Split {
        /// Input file, or `-` for standard input
        file: PathBuf,
        /// Directory receiving the split interchanges
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

#[derive(Serialize)]
struct Summary<'a> {
    index: usize,
    kind: SyntaxKind,
    metadata: Option<&'a Metadata>,
}

fn open(path: &Path) -> anyhow::Result<Box<dyn Read>> {
    if path.as_os_str() == "-" {
        Ok(Box::new(io::stdin()))
    } else {
        let file =
            File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
        Ok(Box::new(file))
    }
}

fn inspect(file: &Path) -> anyhow::Result<()> {
    let mut splitter = Interchanges::new(open(file)?).context("initial read failed")?;
    let mut index = 0usize;
    while let Some(mut view) = splitter.next_interchange()? {
        let summary = Summary {
            index,
            kind: view.metadata().map_or(SyntaxKind::Unknown, Metadata::kind),
            metadata: view.metadata(),
        };
        println!("{}", serde_json::to_string(&summary)?);
        io::copy(&mut view, &mut io::sink()).context("draining interchange")?;
        index += 1;
    }
    Ok(())
}

fn split(file: &Path, out_dir: &Path) -> anyhow::Result<()> {
    let stem = file
        .file_stem()
        .map_or_else(|| "interchange".to_owned(), |s| s.to_string_lossy().into_owned());
    let mut splitter = Interchanges::new(open(file)?).context("initial read failed")?;
    let mut index = 0usize;
    while let Some(mut view) = splitter.next_interchange()? {
        let target = out_dir.join(format!("{stem}-{index:04}.edi"));
        let mut out = File::create(&target)
            .with_context(|| format!("cannot create {}", target.display()))?;
        let bytes = io::copy(&mut view, &mut out)
            .with_context(|| format!("writing {}", target.display()))?;
        println!("{} ({bytes} bytes)", target.display());
        index += 1;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Inspect { file } => inspect(&file),
        Commands::Split { file, out_dir } => split(&file, &out_dir),
    }
}
