// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! `tpm2cvt` converts marshaled TPM 2.0 public keys and signatures to
//! standard on-disk formats and prints serialized quote files.

use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use std::io::BufReader;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use tpm2_convert::PubkeyFormat;
use tpm2_convert::SignatureFormat;
use tpm2_format::attest;
use tpm2_format::public::PublicKey;
use tpm2_format::signature::Signature;

#[derive(Parser)]
#[clap(name = "tpm2cvt", about = "Convert TPM 2.0 structures between on-disk formats.")]
struct Options {
    /// Enable verbose logging (trace level)
    #[clap(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a marshaled public key to tss, der, or pem
    ConvertPubkey {
        /// Output format
        #[clap(long, short)]
        format: PubkeyFormat,
        /// Path to the marshaled public key structure
        #[clap(long, short)]
        input: PathBuf,
        /// Destination file
        #[clap(long, short)]
        output: PathBuf,
    },
    /// Convert a marshaled signature to tss or plain
    ConvertSignature {
        /// Output format
        #[clap(long, short)]
        format: SignatureFormat,
        /// Path to the marshaled signature structure
        #[clap(long, short)]
        input: PathBuf,
        /// Destination file
        #[clap(long, short)]
        output: PathBuf,
    },
    /// Decode serialized quote files and print their fields
    PrintQuote {
        /// Quote files to print
        #[clap(required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    let options = Options::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if options.verbose {
            tracing::Level::TRACE
        } else {
            tracing::Level::INFO
        })
        .init();

    match run(options.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::ConvertPubkey {
            format,
            input,
            output,
        } => {
            let bytes = fs_err::read(&input)?;
            let key = PublicKey::deserialize(&mut bytes.as_slice())
                .context("failed to decode public key structure")?;
            tpm2_convert::convert_pubkey(&key, format, &output)?;
            Ok(())
        }
        Command::ConvertSignature {
            format,
            input,
            output,
        } => {
            let bytes = fs_err::read(&input)?;
            let signature = Signature::deserialize(&mut bytes.as_slice())
                .context("failed to decode signature structure")?;
            tpm2_convert::convert_signature(&signature, format, &output)?;
            Ok(())
        }
        Command::PrintQuote { files } => print_quotes(&files, &mut std::io::stdout()),
    }
}

fn print_quotes(files: &[PathBuf], out: &mut impl Write) -> anyhow::Result<()> {
    let mut failed = 0;
    for (i, path) in files.iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        writeln!(out, "filename={}", path.display())?;
        if let Err(err) = print_quote_file(path, out) {
            tracing::error!("{}: {err:#}", path.display());
            failed += 1;
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} quote file(s) failed to decode");
    }
    Ok(())
}

fn print_quote_file(path: &Path, out: &mut impl Write) -> anyhow::Result<()> {
    let file = fs_err::File::open(path)?;
    attest::print_quote(&mut BufReader::new(file), out)?;
    Ok(())
}
