// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Network-byte-order integer primitives and the TPM2B sized-buffer codec.

use std::io;
use std::io::Read;
use std::io::Write;
use thiserror::Error;

/// Reads a single byte from `r`.
pub fn read_u8(r: &mut impl Read) -> io::Result<u8> {
    let mut buf = [0; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Reads a big-endian u16 from `r`.
pub fn read_u16(r: &mut impl Read) -> io::Result<u16> {
    let mut buf = [0; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

/// Reads a big-endian u32 from `r`.
pub fn read_u32(r: &mut impl Read) -> io::Result<u32> {
    let mut buf = [0; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

/// Reads a big-endian u64 from `r`.
pub fn read_u64(r: &mut impl Read) -> io::Result<u64> {
    let mut buf = [0; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

/// Writes a single byte to `w`.
pub fn write_u8(w: &mut impl Write, value: u8) -> io::Result<()> {
    w.write_all(&[value])
}

/// Writes `value` to `w` in big-endian order.
pub fn write_u16(w: &mut impl Write, value: u16) -> io::Result<()> {
    w.write_all(&value.to_be_bytes())
}

/// Writes `value` to `w` in big-endian order.
pub fn write_u32(w: &mut impl Write, value: u32) -> io::Result<()> {
    w.write_all(&value.to_be_bytes())
}

/// Writes `value` to `w` in big-endian order.
pub fn write_u64(w: &mut impl Write, value: u64) -> io::Result<()> {
    w.write_all(&value.to_be_bytes())
}

/// Payload too large to carry in a TPM2B buffer.
#[derive(Debug, Error)]
#[error("payload of {0} bytes exceeds the TPM2B limit of 65535")]
pub struct PayloadTooLarge(pub usize);

/// TPM2B: an opaque buffer prefixed by a 16-bit big-endian length.
///
/// This is the universal sized-buffer convention in marshaled TPM 2.0
/// structures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tpm2bBuffer {
    buffer: Vec<u8>,
}

impl Tpm2bBuffer {
    /// Wraps `buffer`, failing if its length cannot be represented in the
    /// 16-bit size prefix.
    pub fn new(buffer: Vec<u8>) -> Result<Self, PayloadTooLarge> {
        if buffer.len() > usize::from(u16::MAX) {
            return Err(PayloadTooLarge(buffer.len()));
        }
        Ok(Self { buffer })
    }

    /// Reads the size prefix and payload from `r`.
    pub fn deserialize(r: &mut impl Read) -> io::Result<Self> {
        let size = read_u16(r)?;
        let mut buffer = vec![0; usize::from(size)];
        r.read_exact(&mut buffer)?;
        Ok(Self { buffer })
    }

    /// Marshals the size prefix and payload.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.buffer.len());
        out.extend_from_slice(&(self.buffer.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.buffer);
        out
    }

    /// Writes the size prefix and payload to `w`.
    pub fn write_to(&self, w: &mut impl Write) -> io::Result<()> {
        write_u16(w, self.buffer.len() as u16)?;
        w.write_all(&self.buffer)
    }

    /// The payload, without the size prefix.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
