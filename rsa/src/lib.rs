#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]
#![doc(
    html_logo_url = "https://raw.githubusercontent.com/RustCrypto/media/8f1a9894/logo.svg",
    html_favicon_url = "https://raw.githubusercontent.com/RustCrypto/media/8f1a9894/logo.svg"
)]
#![forbid(unsafe_code, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]

mod config;
mod context;
mod digest;
mod error;
mod fips;
mod key;
mod padding;
mod params;
mod pss;
mod sigalg;
mod signer;

pub use crate::{
    config::{Provider, ProviderConfig},
    context::{Operation, SignatureContext, State},
    digest::{BoundDigest, DigestAlgorithm, DigestEngine, MAX_DIGEST_NAME_LEN},
    error::{Error, Result},
    fips::{FipsCheck, FipsIndicator, MIN_SIGNING_KEY_BITS, MIN_VERIFYING_KEY_BITS},
    key::{KeyType, PssRestrictions, RsaKey},
    padding::PadMode,
    params::{
        signature_algorithm_id, PadModeParam, ParamKey, ParamValue, SaltLengthParam,
        SignatureParams, DEFAULT_DIGEST_NAME, ID_MGF1, ID_RSASSA_PSS,
    },
    pss::{check_salt_floor, resolve_salt_len, SaltLength},
    sigalg::{query_key_types, SigalgContext, SigalgInfo, SIGALGS},
    signer::{SigalgSigningKey, SigalgVerifyingKey},
};

pub use rsa;
pub use signature;

use core::fmt::{Debug, Display, Formatter, LowerHex, UpperHex};
use signature::SignatureEncoding;
use spki::{
    der::{asn1::BitString, Result as DerResult},
    SignatureBitStringEncoding,
};

/// RSA signature: a big-endian integer as long as the modulus.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature {
    bytes: Box<[u8]>,
}

impl Signature {
    /// Signature bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl SignatureEncoding for Signature {
    type Repr = Box<[u8]>;

    fn encoded_len(&self) -> usize {
        self.bytes.len()
    }
}

impl SignatureBitStringEncoding for Signature {
    fn to_bitstring(&self) -> DerResult<BitString> {
        BitString::new(0, self.to_vec())
    }
}

impl TryFrom<&[u8]> for Signature {
    type Error = signature::Error;

    fn try_from(bytes: &[u8]) -> signature::Result<Self> {
        if bytes.is_empty() {
            return Err(signature::Error::new());
        }
        Ok(Self {
            bytes: bytes.into(),
        })
    }
}

impl From<Vec<u8>> for Signature {
    fn from(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into_boxed_slice(),
        }
    }
}

impl From<Signature> for Box<[u8]> {
    fn from(signature: Signature) -> Box<[u8]> {
        signature.bytes
    }
}

impl Debug for Signature {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> core::fmt::Result {
        fmt.debug_tuple("Signature")
            .field(&format_args!("{:x}", self))
            .finish()
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl LowerHex for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        for byte in self.as_bytes() {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl UpperHex for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        for byte in self.as_bytes() {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:X}", self)
    }
}
