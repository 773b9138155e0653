// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Decoding of serialized TPMS_ATTEST quote records.
//!
//! Quote files are attestation evidence passed between machines, so every
//! multi-byte and variable-length field is bounds-checked as it is read.

use crate::AlgId;
use crate::wire;
use crate::wire::Tpm2bBuffer;
use std::io;
use std::io::Read;
use std::io::Write;
use thiserror::Error;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;
use zerocopy::byteorder::big_endian::U32;
use zerocopy::byteorder::big_endian::U64;

/// TPM_GENERATED_VALUE: the magic constant leading every TPM-generated
/// attestation structure.
pub const TPM_GENERATED_VALUE: u32 = 0xff544347;

/// TPM_ST_ATTEST_QUOTE: the structure tag of a quote.
pub const TPM_ST_ATTEST_QUOTE: u16 = 0x8018;

/// Errors from decoding a quote file.
#[derive(Debug, Error)]
pub enum QuoteError {
    /// The first four bytes are not TPM_GENERATED_VALUE.
    #[error("bad magic {0:#010x}")]
    BadMagic(u32),
    /// The attestation structure is not a quote.
    #[error("attest type {0:#06x} is not a quote")]
    WrongType(u16),
    /// The input ended inside a field.
    #[error("file too short")]
    Truncated(#[source] io::Error),
    /// The pcrDigest field has zero length.
    #[error("digest missing (zero size)")]
    EmptyDigest,
    /// Writing the decoded representation failed.
    #[error("failed to write decoded output")]
    Output(#[source] io::Error),
}

/// TPMS_CLOCK_INFO, as marshaled inside an attestation structure.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned,
)]
pub struct ClockInfo {
    /// Milliseconds the TPM has been powered since the last clock write.
    pub clock: U64,
    /// Number of TPM resets since the clock was last written.
    pub reset_count: U32,
    /// Number of TPM restarts and resumes since the last reset.
    pub restart_count: U32,
    /// Nonzero if the clock cannot have rolled backwards.
    pub safe: u8,
}

/// One TPMS_PCR_SELECTION entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcrSelection {
    /// Hash algorithm naming the PCR bank.
    pub hash_alg: AlgId,
    /// Selection bitmap, one bit per register.
    pub bitmap: Vec<u8>,
}

/// A fully decoded quote record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestQuote {
    /// Qualified name of the signing key.
    pub qualified_signer: Tpm2bBuffer,
    /// Caller-supplied qualifying data.
    pub extra_data: Tpm2bBuffer,
    /// TPM clock state at quote time.
    pub clock_info: ClockInfo,
    /// TPM firmware version.
    pub firmware_version: u64,
    /// PCR banks and registers covered by the digest.
    pub pcr_selections: Vec<PcrSelection>,
    /// Digest over the selected PCR values.
    pub pcr_digest: Tpm2bBuffer,
}

fn short(err: io::Error) -> QuoteError {
    QuoteError::Truncated(err)
}

fn read_header(r: &mut impl Read) -> Result<(), QuoteError> {
    let magic = wire::read_u32(r).map_err(short)?;
    if magic != TPM_GENERATED_VALUE {
        return Err(QuoteError::BadMagic(magic));
    }
    let attest_type = wire::read_u16(r).map_err(short)?;
    if attest_type != TPM_ST_ATTEST_QUOTE {
        return Err(QuoteError::WrongType(attest_type));
    }
    Ok(())
}

fn read_selection(r: &mut impl Read) -> Result<PcrSelection, QuoteError> {
    let hash_alg = AlgId(wire::read_u16(r).map_err(short)?);
    let sizeof_select = wire::read_u8(r).map_err(short)?;
    let mut bitmap = vec![0; usize::from(sizeof_select)];
    r.read_exact(&mut bitmap).map_err(short)?;
    Ok(PcrSelection { hash_alg, bitmap })
}

impl AttestQuote {
    /// Decodes a serialized quote from `r`, validating every field.
    pub fn deserialize(r: &mut impl Read) -> Result<Self, QuoteError> {
        read_header(r)?;
        let qualified_signer = Tpm2bBuffer::deserialize(r).map_err(short)?;
        let extra_data = Tpm2bBuffer::deserialize(r).map_err(short)?;
        let mut raw = [0; size_of::<ClockInfo>()];
        r.read_exact(&mut raw).map_err(short)?;
        let clock_info = ClockInfo::read_from_bytes(raw.as_slice()).unwrap();
        let firmware_version = wire::read_u64(r).map_err(short)?;
        let count = wire::read_u32(r).map_err(short)?;
        let mut pcr_selections = Vec::new();
        for _ in 0..count {
            pcr_selections.push(read_selection(r)?);
        }
        let pcr_digest = Tpm2bBuffer::deserialize(r).map_err(short)?;
        if pcr_digest.is_empty() {
            return Err(QuoteError::EmptyDigest);
        }
        Ok(Self {
            qualified_signer,
            extra_data,
            clock_info,
            firmware_version,
            pcr_selections,
            pcr_digest,
        })
    }

    /// Marshals the record back into the serialized quote layout.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&TPM_GENERATED_VALUE.to_be_bytes());
        out.extend_from_slice(&TPM_ST_ATTEST_QUOTE.to_be_bytes());
        out.extend_from_slice(&self.qualified_signer.serialize());
        out.extend_from_slice(&self.extra_data.serialize());
        out.extend_from_slice(self.clock_info.as_bytes());
        out.extend_from_slice(&self.firmware_version.to_be_bytes());
        out.extend_from_slice(&(self.pcr_selections.len() as u32).to_be_bytes());
        for selection in &self.pcr_selections {
            out.extend_from_slice(&selection.hash_alg.0.to_be_bytes());
            out.push(selection.bitmap.len() as u8);
            out.extend_from_slice(&selection.bitmap);
        }
        out.extend_from_slice(&self.pcr_digest.serialize());
        out
    }
}

/// Decodes a quote from `r`, printing each field to `out` as it is read.
///
/// Fields print in decode order, so a file that fails late still shows
/// everything that was valid up to the failure; the caller only learns the
/// file was bad from the returned error. Use [`AttestQuote::deserialize`]
/// for the all-or-nothing programmatic path.
pub fn print_quote(r: &mut impl Read, out: &mut impl Write) -> Result<(), QuoteError> {
    let emit = QuoteError::Output;

    read_header(r)?;

    let qualified_signer = Tpm2bBuffer::deserialize(r).map_err(short)?;
    writeln!(
        out,
        "qualifiedSigner={}",
        hex::encode(qualified_signer.as_bytes())
    )
    .map_err(emit)?;

    let extra_data = Tpm2bBuffer::deserialize(r).map_err(short)?;
    writeln!(out, "extraData={}", hex::encode(extra_data.as_bytes())).map_err(emit)?;

    // clockInfo prints field by field so a truncated file still shows the
    // fields that were present.
    let clock = wire::read_u64(r).map_err(short)?;
    writeln!(out, "clockInfo.clock={clock}").map_err(emit)?;
    let reset_count = wire::read_u32(r).map_err(short)?;
    writeln!(out, "clockInfo.resetCount={reset_count}").map_err(emit)?;
    let restart_count = wire::read_u32(r).map_err(short)?;
    writeln!(out, "clockInfo.restartCount={restart_count}").map_err(emit)?;
    let safe = wire::read_u8(r).map_err(short)?;
    writeln!(out, "clockInfo.safe={safe}").map_err(emit)?;

    let firmware_version = wire::read_u64(r).map_err(short)?;
    writeln!(out, "firmwareVersion={firmware_version:#x}").map_err(emit)?;

    let count = wire::read_u32(r).map_err(short)?;
    writeln!(out, "attested.quote.pcrSelect.count={count}").map_err(emit)?;
    for i in 0..count {
        let hash_alg = wire::read_u16(r).map_err(short)?;
        writeln!(out, "attested.quote.pcrSelect[{i}].hash={hash_alg}").map_err(emit)?;
        let sizeof_select = wire::read_u8(r).map_err(short)?;
        writeln!(out, "attested.quote.pcrSelect[{i}].sizeofSelect={sizeof_select}").map_err(emit)?;
        let mut bitmap = vec![0; usize::from(sizeof_select)];
        r.read_exact(&mut bitmap).map_err(short)?;
        writeln!(
            out,
            "attested.quote.pcrSelect[{i}].pcrSelect={}",
            hex::encode(&bitmap)
        )
        .map_err(emit)?;
    }

    let digest_size = wire::read_u16(r).map_err(short)?;
    writeln!(out, "attested.quote.pcrDigest.size={digest_size}").map_err(emit)?;
    if digest_size == 0 {
        return Err(QuoteError::EmptyDigest);
    }
    let mut digest = vec![0; usize::from(digest_size)];
    r.read_exact(&mut digest).map_err(short)?;
    writeln!(out, "attested.quote.pcrDigest={}", hex::encode(&digest)).map_err(emit)?;

    Ok(())
}
