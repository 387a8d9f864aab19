//! Digest binding: name resolution, digest metadata and running engines.

use crate::{Error, Result};
use der::{
    asn1::{Null, ObjectIdentifier, OctetStringRef},
    Any, Encode, Tag,
};
use digest::DynDigest;
use spki::AlgorithmIdentifierOwned;

/// Capacity of the informational digest name buffer. Names of this length
/// or longer are rejected.
pub const MAX_DIGEST_NAME_LEN: usize = 50;

/// Hash algorithms known to the digest binding.
///
/// Every variant exists regardless of Cargo features; variants whose engine
/// is not compiled in report `false` from [`DigestAlgorithm::is_available`]
/// and never resolve by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DigestAlgorithm {
    /// SHA-1
    Sha1,
    /// SHA-224
    Sha224,
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
    /// SHA-512/224
    Sha512_224,
    /// SHA-512/256
    Sha512_256,
    /// SHA3-224
    Sha3_224,
    /// SHA3-256
    Sha3_256,
    /// SHA3-384
    Sha3_384,
    /// SHA3-512
    Sha3_512,
    /// SHAKE128 (extendable output)
    Shake128,
    /// SHAKE256 (extendable output)
    Shake256,
    /// Keccak-256 (pre-standard SHA-3 padding)
    Keccak256,
    /// RIPEMD-160
    Ripemd160,
    /// SM3
    Sm3,
}

impl DigestAlgorithm {
    /// Every known algorithm, in table order.
    pub const ALL: [DigestAlgorithm; 16] = [
        Self::Sha1,
        Self::Sha224,
        Self::Sha256,
        Self::Sha384,
        Self::Sha512,
        Self::Sha512_224,
        Self::Sha512_256,
        Self::Sha3_224,
        Self::Sha3_256,
        Self::Sha3_384,
        Self::Sha3_512,
        Self::Shake128,
        Self::Shake256,
        Self::Keccak256,
        Self::Ripemd160,
        Self::Sm3,
    ];

    /// Canonical name.
    pub fn name(self) -> &'static str {
        self.names()[0]
    }

    /// Canonical name followed by accepted aliases.
    pub fn names(self) -> &'static [&'static str] {
        match self {
            Self::Sha1 => &["SHA1", "SHA-1", "SSL3-SHA1"],
            Self::Sha224 => &["SHA2-224", "SHA-224", "SHA224"],
            Self::Sha256 => &["SHA2-256", "SHA-256", "SHA256"],
            Self::Sha384 => &["SHA2-384", "SHA-384", "SHA384"],
            Self::Sha512 => &["SHA2-512", "SHA-512", "SHA512"],
            Self::Sha512_224 => &["SHA2-512/224", "SHA-512/224", "SHA512-224"],
            Self::Sha512_256 => &["SHA2-512/256", "SHA-512/256", "SHA512-256"],
            Self::Sha3_224 => &["SHA3-224"],
            Self::Sha3_256 => &["SHA3-256"],
            Self::Sha3_384 => &["SHA3-384"],
            Self::Sha3_512 => &["SHA3-512"],
            Self::Shake128 => &["SHAKE-128", "SHAKE128"],
            Self::Shake256 => &["SHAKE-256", "SHAKE256"],
            Self::Keccak256 => &["KECCAK-256"],
            Self::Ripemd160 => &["RIPEMD160", "RIPEMD-160", "RIPEMD", "RMD160"],
            Self::Sm3 => &["SM3"],
        }
    }

    /// Case-insensitive lookup by name, alias or dotted OID. Algorithms
    /// whose engine is not compiled in are not found.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().filter(|alg| alg.is_available()).find(|alg| {
            alg.names().iter().any(|n| n.eq_ignore_ascii_case(name))
                || alg.oid().is_some_and(|oid| oid.to_string() == name)
        })
    }

    /// Whether the engine for this algorithm is part of the build.
    pub fn is_available(self) -> bool {
        match self {
            Self::Ripemd160 => cfg!(feature = "ripemd160"),
            Self::Sm3 => cfg!(feature = "sm3"),
            _ => true,
        }
    }

    /// Output size in bytes. For XOFs this is the conventional default length.
    pub fn output_size(self) -> usize {
        match self {
            Self::Ripemd160 | Self::Sha1 => 20,
            Self::Sha224 | Self::Sha512_224 | Self::Sha3_224 => 28,
            Self::Sha256
            | Self::Sha512_256
            | Self::Sha3_256
            | Self::Keccak256
            | Self::Sm3
            | Self::Shake256 => 32,
            Self::Shake128 => 16,
            Self::Sha384 | Self::Sha3_384 => 48,
            Self::Sha512 | Self::Sha3_512 => 64,
        }
    }

    /// Whether this is an extendable-output function.
    pub fn is_xof(self) -> bool {
        matches!(self, Self::Shake128 | Self::Shake256)
    }

    /// Object identifier of the hash itself. Keccak-256 has none.
    pub fn oid(self) -> Option<ObjectIdentifier> {
        let oid = match self {
            Self::Sha1 => "1.3.14.3.2.26",
            Self::Sha224 => "2.16.840.1.101.3.4.2.4",
            Self::Sha256 => "2.16.840.1.101.3.4.2.1",
            Self::Sha384 => "2.16.840.1.101.3.4.2.2",
            Self::Sha512 => "2.16.840.1.101.3.4.2.3",
            Self::Sha512_224 => "2.16.840.1.101.3.4.2.5",
            Self::Sha512_256 => "2.16.840.1.101.3.4.2.6",
            Self::Sha3_224 => "2.16.840.1.101.3.4.2.7",
            Self::Sha3_256 => "2.16.840.1.101.3.4.2.8",
            Self::Sha3_384 => "2.16.840.1.101.3.4.2.9",
            Self::Sha3_512 => "2.16.840.1.101.3.4.2.10",
            Self::Shake128 => "2.16.840.1.101.3.4.2.11",
            Self::Shake256 => "2.16.840.1.101.3.4.2.12",
            Self::Ripemd160 => "1.3.36.3.2.1",
            Self::Sm3 => "1.2.156.10197.1.401",
            Self::Keccak256 => return None,
        };
        Some(ObjectIdentifier::new_unwrap(oid))
    }

    /// Identifier of the `<hash>WithRSAEncryption` signature algorithm, if
    /// the hash may be used for RSA signatures at all.
    pub fn rsa_signature_oid(self) -> Option<ObjectIdentifier> {
        let oid = match self {
            Self::Sha1 => "1.2.840.113549.1.1.5",
            Self::Sha224 => "1.2.840.113549.1.1.14",
            Self::Sha256 => "1.2.840.113549.1.1.11",
            Self::Sha384 => "1.2.840.113549.1.1.12",
            Self::Sha512 => "1.2.840.113549.1.1.13",
            Self::Sha512_224 => "1.2.840.113549.1.1.15",
            Self::Sha512_256 => "1.2.840.113549.1.1.16",
            Self::Sha3_224 => "2.16.840.1.101.3.4.3.13",
            Self::Sha3_256 => "2.16.840.1.101.3.4.3.14",
            Self::Sha3_384 => "2.16.840.1.101.3.4.3.15",
            Self::Sha3_512 => "2.16.840.1.101.3.4.3.16",
            Self::Ripemd160 => "1.3.36.3.3.1.2",
            Self::Sm3 => "1.2.156.10197.1.504",
            Self::Shake128 | Self::Shake256 | Self::Keccak256 => return None,
        };
        Some(ObjectIdentifier::new_unwrap(oid))
    }

    /// X9.31 trailer hash identifier byte.
    pub fn x931_hash_id(self) -> Option<u8> {
        match self {
            Self::Sha1 => Some(0x33),
            Self::Sha256 => Some(0x34),
            Self::Sha384 => Some(0x36),
            Self::Sha512 => Some(0x35),
            _ => None,
        }
    }

    /// Whether the hash may appear in the restrictions of an RSA-PSS key.
    pub fn is_pss_restriction_digest(self) -> bool {
        matches!(
            self,
            Self::Sha1
                | Self::Sha224
                | Self::Sha256
                | Self::Sha384
                | Self::Sha512
                | Self::Sha512_224
                | Self::Sha512_256
        )
    }

    /// Whether the hash is FIPS-approved for signatures. SHA-1 is approved
    /// for verification only.
    pub fn is_fips_approved(self, signing: bool) -> bool {
        match self {
            Self::Sha1 => !signing,
            Self::Sha224
            | Self::Sha256
            | Self::Sha384
            | Self::Sha512
            | Self::Sha512_224
            | Self::Sha512_256
            | Self::Sha3_224
            | Self::Sha3_256
            | Self::Sha3_384
            | Self::Sha3_512 => true,
            _ => false,
        }
    }

    /// Creates a fresh running engine.
    pub fn new_engine(self) -> Result<Box<dyn DigestEngine>> {
        let engine: Box<dyn DigestEngine> = match self {
            Self::Sha1 => Box::new(sha1::Sha1::default()),
            Self::Sha224 => Box::new(sha2::Sha224::default()),
            Self::Sha256 => Box::new(sha2::Sha256::default()),
            Self::Sha384 => Box::new(sha2::Sha384::default()),
            Self::Sha512 => Box::new(sha2::Sha512::default()),
            Self::Sha512_224 => Box::new(sha2::Sha512_224::default()),
            Self::Sha512_256 => Box::new(sha2::Sha512_256::default()),
            Self::Sha3_224 => Box::new(sha3::Sha3_224::default()),
            Self::Sha3_256 => Box::new(sha3::Sha3_256::default()),
            Self::Sha3_384 => Box::new(sha3::Sha3_384::default()),
            Self::Sha3_512 => Box::new(sha3::Sha3_512::default()),
            Self::Keccak256 => Box::new(sha3::Keccak256::default()),
            Self::Shake128 | Self::Shake256 => return Err(Error::XofNotAllowed),
            #[cfg(feature = "ripemd160")]
            Self::Ripemd160 => Box::new(ripemd::Ripemd160::default()),
            #[cfg(feature = "sm3")]
            Self::Sm3 => Box::new(sm3::Sm3::default()),
            #[allow(unreachable_patterns)]
            other => return Err(Error::InvalidDigest(format!("{other} is not available"))),
        };
        Ok(engine)
    }

    /// Hashes `data` in one go.
    pub fn digest(self, data: &[u8]) -> Result<Box<[u8]>> {
        let mut engine = self.new_engine()?;
        engine.update(data);
        Ok(engine.finalize_reset())
    }
}

impl core::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Object-safe running digest that can be cloned mid-stream.
pub trait DigestEngine: DynDigest + Send + Sync {
    /// Clones the engine including its absorbed state.
    fn clone_engine(&self) -> Box<dyn DigestEngine>;
}

impl<D> DigestEngine for D
where
    D: DynDigest + Clone + Send + Sync + 'static,
{
    fn clone_engine(&self) -> Box<dyn DigestEngine> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn DigestEngine> {
    fn clone(&self) -> Self {
        self.clone_engine()
    }
}

/// A digest bound to a context, remembering the name it was requested by.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundDigest {
    /// Resolved algorithm.
    pub alg: DigestAlgorithm,
    /// Name as supplied by the caller.
    pub name: String,
    /// Property query the digest was fetched with.
    pub properties: Option<String>,
}

impl BoundDigest {
    pub(crate) fn new(alg: DigestAlgorithm, name: &str, properties: Option<&str>) -> Self {
        Self {
            alg,
            name: name.to_owned(),
            properties: properties.map(str::to_owned),
        }
    }
}

/// `AlgorithmIdentifier` for a hash with explicit NULL parameters.
pub(crate) fn hash_algorithm_identifier(alg: DigestAlgorithm) -> Result<AlgorithmIdentifierOwned> {
    let oid = alg
        .oid()
        .ok_or_else(|| Error::DigestNotAllowed(alg.name().to_owned()))?;
    Ok(AlgorithmIdentifierOwned {
        oid,
        parameters: Some(Any::encode_from(&Null)?),
    })
}

/// DER `DigestInfo` as embedded in PKCS#1 v1.5 signature blocks.
pub(crate) fn digest_info(alg: DigestAlgorithm, hash: &[u8]) -> Result<Vec<u8>> {
    let mut inner = hash_algorithm_identifier(alg)?.to_der()?;
    OctetStringRef::new(hash)?.encode_to_vec(&mut inner)?;
    Ok(Any::new(Tag::Sequence, inner)?.to_der()?)
}
