// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error object for format conversions.

use openssl::error::ErrorStack;
use std::io;
use thiserror::Error;
use tpm2_format::AlgId;

/// Conversion failures.
#[derive(Debug, Error)]
pub enum Error {
    /// DER and PEM output support RSA keys only
    #[error("unsupported key algorithm {0} for requested output format, only RSA is supported")]
    UnsupportedAlgorithm(AlgId),
    /// Plain output needs a recognized signing scheme
    #[error("unsupported signature scheme {0} for plain output")]
    UnsupportedScheme(AlgId),
    /// The output format label is not recognized
    #[error("invalid output format '{0}'")]
    InvalidFormatLabel(String),
    /// The destination file could not be created
    #[error("failed to open output file")]
    FileOpen(#[source] io::Error),
    /// Writing the destination file failed
    #[error("failed to write output file")]
    Write(#[source] io::Error),
    /// OpenSSL rejected the key material or failed to encode it
    #[error("public key conversion failed: {1}")]
    CryptoConversion(#[source] ErrorStack, &'static str),
}
