// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The marshaled RSA public-key structure.

use crate::AlgId;
use crate::wire;
use crate::wire::Tpm2bBuffer;
use std::io;
use std::io::Read;
use thiserror::Error;

/// Errors from building or decoding a [`PublicKey`].
#[derive(Debug, Error)]
pub enum PublicKeyError {
    /// The modulus does not match the declared key size.
    #[error("modulus is {modulus_len} bytes, declared key size is {key_bits} bits")]
    ModulusLengthMismatch {
        /// Length of the unique buffer in bytes.
        modulus_len: usize,
        /// Declared key size in bits.
        key_bits: u16,
    },
    /// The input ended inside the structure.
    #[error("truncated public key structure")]
    Truncated(#[from] io::Error),
}

/// An RSA public area as carried in marshaled TPM structures.
///
/// The layout is `alg(u16) || keyBits(u16) || exponent(u32) || unique(TPM2B)`,
/// all big-endian. An exponent of zero stands for the RSA default (65537);
/// substitution happens at conversion time, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    /// Key algorithm. Only TPM_ALG_RSA keys can be converted to DER or PEM.
    pub alg: AlgId,
    /// Declared key size in bits.
    pub key_bits: u16,
    /// Public exponent; zero means the default.
    pub exponent: u32,
    /// The public modulus.
    pub unique: Tpm2bBuffer,
}

impl PublicKey {
    /// Builds a public key, validating the modulus against `key_bits`.
    pub fn new(
        alg: AlgId,
        key_bits: u16,
        exponent: u32,
        unique: Tpm2bBuffer,
    ) -> Result<Self, PublicKeyError> {
        let key = Self {
            alg,
            key_bits,
            exponent,
            unique,
        };
        key.validate()?;
        Ok(key)
    }

    // keyBits only describes the unique buffer for RSA keys.
    fn validate(&self) -> Result<(), PublicKeyError> {
        if self.alg == AlgId::RSA && self.unique.len() != usize::from(self.key_bits / 8) {
            return Err(PublicKeyError::ModulusLengthMismatch {
                modulus_len: self.unique.len(),
                key_bits: self.key_bits,
            });
        }
        Ok(())
    }

    /// Decodes the marshaled layout from `r`.
    pub fn deserialize(r: &mut impl Read) -> Result<Self, PublicKeyError> {
        let alg = AlgId(wire::read_u16(r)?);
        let key_bits = wire::read_u16(r)?;
        let exponent = wire::read_u32(r)?;
        let unique = Tpm2bBuffer::deserialize(r)?;
        Self::new(alg, key_bits, exponent, unique)
    }

    /// Marshals the structure.
    ///
    /// This is the layout the `tss` output format dumps verbatim: a
    /// diagnostic dump of this structure, not a TPM wire message.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.alg.0.to_be_bytes());
        out.extend_from_slice(&self.key_bits.to_be_bytes());
        out.extend_from_slice(&self.exponent.to_be_bytes());
        out.extend_from_slice(&self.unique.serialize());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_2048() -> PublicKey {
        PublicKey::new(
            AlgId::RSA,
            2048,
            0,
            Tpm2bBuffer::new(vec![0xaa; 256]).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn round_trips() {
        let key = key_2048();
        let bytes = key.serialize();
        let decoded = PublicKey::deserialize(&mut bytes.as_slice()).unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn marshaled_layout() {
        let key = PublicKey::new(AlgId::RSA, 16, 0x10001, Tpm2bBuffer::new(vec![0xab, 0xcd]).unwrap())
            .unwrap();
        assert_eq!(
            key.serialize(),
            [0x00, 0x01, 0x00, 0x10, 0x00, 0x01, 0x00, 0x01, 0x00, 0x02, 0xab, 0xcd]
        );
    }

    #[test]
    fn modulus_must_match_key_bits() {
        let err = PublicKey::new(
            AlgId::RSA,
            2048,
            0,
            Tpm2bBuffer::new(vec![0xaa; 255]).unwrap(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PublicKeyError::ModulusLengthMismatch {
                modulus_len: 255,
                key_bits: 2048,
            }
        ));
    }

    #[test]
    fn non_rsa_keys_skip_the_modulus_check() {
        // an ECC point is not sized by keyBits / 8
        PublicKey::new(AlgId::ECC, 256, 0, Tpm2bBuffer::new(vec![0; 65]).unwrap()).unwrap();
    }

    #[test]
    fn truncated_structure_fails() {
        let mut bytes = key_2048().serialize();
        bytes.truncate(bytes.len() - 1);
        let err = PublicKey::deserialize(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, PublicKeyError::Truncated(_)));
    }
}
