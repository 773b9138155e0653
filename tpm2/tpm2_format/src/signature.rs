// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The marshaled signature structure.

use crate::AlgId;
use crate::wire;
use crate::wire::Tpm2bBuffer;
use std::io;
use std::io::Read;
use thiserror::Error;

/// Errors from building or decoding a [`Signature`].
#[derive(Debug, Error)]
pub enum SignatureError {
    /// The payload variant does not agree with the scheme tag.
    #[error("payload does not match signature scheme {0}")]
    SchemeMismatch(AlgId),
    /// The input ended inside the structure.
    #[error("truncated signature structure")]
    Truncated(#[from] io::Error),
}

/// Scheme-specific signature contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignaturePayload {
    /// TPMS_SIGNATURE_RSA, shared by the RSASSA and RSAPSS schemes.
    Rsa {
        /// Hash algorithm the signature was produced over.
        hash: AlgId,
        /// The raw signature bytes.
        sig: Tpm2bBuffer,
    },
    /// A payload this crate does not interpret, carried verbatim.
    Opaque(Tpm2bBuffer),
}

/// A signature structure: scheme tag plus scheme-specific payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Signing scheme.
    pub sig_alg: AlgId,
    /// Contents for that scheme.
    pub payload: SignaturePayload,
}

impl Signature {
    /// Builds a signature, validating that `payload` fits `sig_alg`.
    pub fn new(sig_alg: AlgId, payload: SignaturePayload) -> Result<Self, SignatureError> {
        let rsa_scheme = matches!(sig_alg, AlgId::RSASSA | AlgId::RSAPSS);
        let rsa_payload = matches!(payload, SignaturePayload::Rsa { .. });
        if rsa_scheme != rsa_payload {
            return Err(SignatureError::SchemeMismatch(sig_alg));
        }
        Ok(Self { sig_alg, payload })
    }

    /// Decodes the marshaled layout from `r`.
    ///
    /// RSA schemes decode as `sigAlg(u16) || hash(u16) || sig(TPM2B)`. Any
    /// other tag carries its payload as a single opaque TPM2B.
    pub fn deserialize(r: &mut impl Read) -> Result<Self, SignatureError> {
        let sig_alg = AlgId(wire::read_u16(r)?);
        let payload = match sig_alg {
            AlgId::RSASSA | AlgId::RSAPSS => SignaturePayload::Rsa {
                hash: AlgId(wire::read_u16(r)?),
                sig: Tpm2bBuffer::deserialize(r)?,
            },
            _ => SignaturePayload::Opaque(Tpm2bBuffer::deserialize(r)?),
        };
        Ok(Self { sig_alg, payload })
    }

    /// Marshals the structure (the `tss` output format, same dump caveat as
    /// [`PublicKey::serialize`](crate::public::PublicKey::serialize)).
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.sig_alg.0.to_be_bytes());
        match &self.payload {
            SignaturePayload::Rsa { hash, sig } => {
                out.extend_from_slice(&hash.0.to_be_bytes());
                out.extend_from_slice(&sig.serialize());
            }
            SignaturePayload::Opaque(data) => out.extend_from_slice(&data.serialize()),
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rsassa_sig() -> Signature {
        Signature::new(
            AlgId::RSASSA,
            SignaturePayload::Rsa {
                hash: AlgId::SHA256,
                sig: Tpm2bBuffer::new(vec![0x5a; 256]).unwrap(),
            },
        )
        .unwrap()
    }

    #[test]
    fn round_trips() {
        let signature = rsassa_sig();
        let bytes = signature.serialize();
        let decoded = Signature::deserialize(&mut bytes.as_slice()).unwrap();
        assert_eq!(decoded, signature);
    }

    #[test]
    fn unknown_scheme_round_trips_as_opaque() {
        let signature = Signature::new(
            AlgId::ECDSA,
            SignaturePayload::Opaque(Tpm2bBuffer::new(vec![1, 2, 3, 4]).unwrap()),
        )
        .unwrap();
        let bytes = signature.serialize();
        let decoded = Signature::deserialize(&mut bytes.as_slice()).unwrap();
        assert_eq!(decoded, signature);
    }

    #[test]
    fn scheme_and_payload_must_agree() {
        let err = Signature::new(
            AlgId::ECDSA,
            SignaturePayload::Rsa {
                hash: AlgId::SHA256,
                sig: Tpm2bBuffer::new(vec![0; 32]).unwrap(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, SignatureError::SchemeMismatch(AlgId::ECDSA)));

        let err = Signature::new(
            AlgId::RSASSA,
            SignaturePayload::Opaque(Tpm2bBuffer::new(vec![0; 32]).unwrap()),
        )
        .unwrap_err();
        assert!(matches!(err, SignatureError::SchemeMismatch(AlgId::RSASSA)));
    }

    #[test]
    fn truncated_structure_fails() {
        let mut bytes = rsassa_sig().serialize();
        bytes.truncate(6);
        let err = Signature::deserialize(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, SignatureError::Truncated(_)));
    }
}
