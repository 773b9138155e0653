// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Conversion of marshaled TPM 2.0 public keys and signatures to standard
//! on-disk formats.
//!
//! Public keys render as the marshaled structure (`tss`), DER, or PEM;
//! signatures as the marshaled structure or the bare signature bytes
//! (`plain`). DER and PEM use the standard SubjectPublicKeyInfo encoding
//! built from the key's modulus and exponent.

mod error;

pub use error::Error;

use openssl::bn::BigNum;
use openssl::pkey::PKey;
use openssl::pkey::Public;
use openssl::rsa::Rsa;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use tpm2_format::AlgId;
use tpm2_format::public::PublicKey;
use tpm2_format::signature::Signature;
use tpm2_format::signature::SignaturePayload;

/// The exponent substituted when a key's stored exponent field is zero.
pub const RSA_DEFAULT_EXPONENT: u32 = 65537;

/// On-disk formats for public keys.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PubkeyFormat {
    /// The marshaled structure, dumped verbatim.
    Tss,
    /// SubjectPublicKeyInfo, DER-encoded.
    Der,
    /// SubjectPublicKeyInfo, PEM-encoded.
    Pem,
}

impl FromStr for PubkeyFormat {
    type Err = Error;

    fn from_str(label: &str) -> Result<Self, Error> {
        match label.to_ascii_lowercase().as_str() {
            "tss" => Ok(Self::Tss),
            "der" => Ok(Self::Der),
            "pem" => Ok(Self::Pem),
            _ => Err(Error::InvalidFormatLabel(label.to_owned())),
        }
    }
}

/// On-disk formats for signatures.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SignatureFormat {
    /// The marshaled structure, dumped verbatim.
    Tss,
    /// The bare signature bytes, no envelope.
    Plain,
}

impl FromStr for SignatureFormat {
    type Err = Error;

    fn from_str(label: &str) -> Result<Self, Error> {
        match label.to_ascii_lowercase().as_str() {
            "tss" => Ok(Self::Tss),
            "plain" => Ok(Self::Plain),
            _ => Err(Error::InvalidFormatLabel(label.to_owned())),
        }
    }
}

/// Writes `key` to `path` in `format`.
///
/// DER and PEM accept RSA keys only; a stored exponent of zero is replaced
/// with [`RSA_DEFAULT_EXPONENT`] before encoding. A file that fails partway
/// through the write is left in place.
pub fn convert_pubkey(key: &PublicKey, format: PubkeyFormat, path: &Path) -> Result<(), Error> {
    let bytes = match format {
        PubkeyFormat::Tss => key.serialize(),
        PubkeyFormat::Der => rsa_public(key)?
            .public_key_to_der()
            .map_err(|e| Error::CryptoConversion(e, "DER encoding"))?,
        PubkeyFormat::Pem => rsa_public(key)?
            .public_key_to_pem()
            .map_err(|e| Error::CryptoConversion(e, "PEM encoding"))?,
    };
    tracing::debug!(?format, path = %path.display(), len = bytes.len(), "writing public key");
    write_output(path, &bytes)
}

fn rsa_public(key: &PublicKey) -> Result<PKey<Public>, Error> {
    if key.alg != AlgId::RSA {
        return Err(Error::UnsupportedAlgorithm(key.alg));
    }
    let exponent = if key.exponent == 0 {
        RSA_DEFAULT_EXPONENT
    } else {
        key.exponent
    };
    let n = BigNum::from_slice(key.unique.as_bytes())
        .map_err(|e| Error::CryptoConversion(e, "modulus conversion"))?;
    let e = BigNum::from_u32(exponent)
        .map_err(|e| Error::CryptoConversion(e, "exponent conversion"))?;
    let rsa = Rsa::from_public_components(n, e)
        .map_err(|e| Error::CryptoConversion(e, "RSA key construction"))?;
    PKey::from_rsa(rsa).map_err(|e| Error::CryptoConversion(e, "RSA key construction"))
}

/// Writes `signature` to `path` in `format`.
///
/// `plain` extracts the bare signature bytes; schemes this crate does not
/// recognize fail with [`Error::UnsupportedScheme`] before anything is
/// written.
pub fn convert_signature(
    signature: &Signature,
    format: SignatureFormat,
    path: &Path,
) -> Result<(), Error> {
    let bytes = match format {
        SignatureFormat::Tss => signature.serialize(),
        SignatureFormat::Plain => plain_signature(signature)?.to_vec(),
    };
    tracing::debug!(?format, path = %path.display(), len = bytes.len(), "writing signature");
    write_output(path, &bytes)
}

fn plain_signature(signature: &Signature) -> Result<&[u8], Error> {
    match &signature.payload {
        SignaturePayload::Rsa { sig, .. } => Ok(sig.as_bytes()),
        SignaturePayload::Opaque(_) => Err(Error::UnsupportedScheme(signature.sig_alg)),
    }
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    let mut file = fs_err::File::create(path).map_err(Error::FileOpen)?;
    file.write_all(bytes).map_err(Error::Write)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use tpm2_format::wire::Tpm2bBuffer;

    fn rsa_key(exponent: u32, modulus: Vec<u8>) -> PublicKey {
        let key_bits = (modulus.len() * 8) as u16;
        PublicKey::new(
            AlgId::RSA,
            key_bits,
            exponent,
            Tpm2bBuffer::new(modulus).unwrap(),
        )
        .unwrap()
    }

    fn out_path(dir: &TempDir, name: &str) -> PathBuf {
        dir.path().join(name)
    }

    #[test]
    fn der_round_trip_preserves_components() {
        let dir = TempDir::new().unwrap();
        let path = out_path(&dir, "key.der");
        let modulus = vec![0xab; 128];
        convert_pubkey(&rsa_key(0x10001, modulus.clone()), PubkeyFormat::Der, &path).unwrap();

        let rsa = Rsa::public_key_from_der(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(rsa.n().to_vec(), modulus);
        assert_eq!(rsa.e().to_vec(), [0x01, 0x00, 0x01]);
    }

    #[test]
    fn zero_exponent_becomes_default() {
        let dir = TempDir::new().unwrap();
        let path = out_path(&dir, "key.der");
        convert_pubkey(&rsa_key(0, vec![0xff; 256]), PubkeyFormat::Der, &path).unwrap();

        let rsa = Rsa::public_key_from_der(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(rsa.n().num_bits(), 2048);
        assert_eq!(rsa.e().to_vec(), [0x01, 0x00, 0x01]);
    }

    #[test]
    fn nonzero_exponent_is_preserved() {
        let dir = TempDir::new().unwrap();
        let path = out_path(&dir, "key.der");
        convert_pubkey(&rsa_key(3, vec![0xab; 128]), PubkeyFormat::Der, &path).unwrap();

        let rsa = Rsa::public_key_from_der(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(rsa.e().to_vec(), [0x03]);
    }

    #[test]
    fn pem_output_is_a_public_key_block() {
        let dir = TempDir::new().unwrap();
        let path = out_path(&dir, "key.pem");
        convert_pubkey(&rsa_key(0, vec![0xab; 128]), PubkeyFormat::Pem, &path).unwrap();

        let pem = std::fs::read_to_string(&path).unwrap();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));
    }

    #[test]
    fn tss_dump_is_verbatim() {
        let dir = TempDir::new().unwrap();
        let path = out_path(&dir, "key.tss");
        let key = rsa_key(0x10001, vec![0xab; 128]);
        convert_pubkey(&key, PubkeyFormat::Tss, &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), key.serialize());
    }

    #[test]
    fn non_rsa_key_rejected_for_der() {
        let dir = TempDir::new().unwrap();
        let path = out_path(&dir, "key.der");
        let key =
            PublicKey::new(AlgId::ECC, 256, 0, Tpm2bBuffer::new(vec![0; 64]).unwrap()).unwrap();
        let err = convert_pubkey(&key, PubkeyFormat::Der, &path).unwrap_err();
        assert!(matches!(err, Error::UnsupportedAlgorithm(AlgId::ECC)));
        assert!(!path.exists());
    }

    #[test]
    fn plain_signature_is_the_bare_bytes() {
        let dir = TempDir::new().unwrap();
        let path = out_path(&dir, "sig.plain");
        let signature = Signature::new(
            AlgId::RSASSA,
            SignaturePayload::Rsa {
                hash: AlgId::SHA256,
                sig: Tpm2bBuffer::new(vec![0x5a; 256]).unwrap(),
            },
        )
        .unwrap();
        convert_signature(&signature, SignatureFormat::Plain, &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![0x5a; 256]);
    }

    #[test]
    fn tss_signature_dump_is_verbatim() {
        let dir = TempDir::new().unwrap();
        let path = out_path(&dir, "sig.tss");
        let signature = Signature::new(
            AlgId::RSAPSS,
            SignaturePayload::Rsa {
                hash: AlgId::SHA256,
                sig: Tpm2bBuffer::new(vec![0x5a; 256]).unwrap(),
            },
        )
        .unwrap();
        convert_signature(&signature, SignatureFormat::Tss, &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), signature.serialize());
    }

    #[test]
    fn unsupported_scheme_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = out_path(&dir, "sig.plain");
        let signature = Signature::new(
            AlgId::ECDSA,
            SignaturePayload::Opaque(Tpm2bBuffer::new(vec![1, 2, 3]).unwrap()),
        )
        .unwrap();
        let err = convert_signature(&signature, SignatureFormat::Plain, &path).unwrap_err();
        assert!(matches!(err, Error::UnsupportedScheme(AlgId::ECDSA)));
        assert!(!path.exists());
    }

    #[test]
    fn format_labels_parse_case_insensitively() {
        assert_eq!("DER".parse::<PubkeyFormat>().unwrap(), PubkeyFormat::Der);
        assert_eq!("pem".parse::<PubkeyFormat>().unwrap(), PubkeyFormat::Pem);
        assert_eq!("Tss".parse::<PubkeyFormat>().unwrap(), PubkeyFormat::Tss);
        assert_eq!(
            "PLAIN".parse::<SignatureFormat>().unwrap(),
            SignatureFormat::Plain
        );

        let err = "asn1".parse::<PubkeyFormat>().unwrap_err();
        assert!(matches!(err, Error::InvalidFormatLabel(label) if label == "asn1"));
        assert!("der".parse::<SignatureFormat>().is_err());
    }
}
