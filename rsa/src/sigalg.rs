//! Fixed RSA + hash signature algorithms.
//!
//! A sigalg context binds its digest and PKCS#1 v1.5 padding at init; only
//! the expected signature of a verify-message operation can be set later.

use crate::{
    context::{Operation, SignatureContext},
    key::RsaKey,
    params::{ParamKey, ParamValue, SignatureParams},
    DigestAlgorithm, Result,
};
use std::sync::Arc;
use tracing::debug;

/// Key types sigalg contexts accept.
const KEY_TYPES: &[&str] = &["RSA"];

/// One entry of the sigalg table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SigalgInfo {
    /// Primary name followed by aliases.
    pub names: &'static [&'static str],
    /// Digest baked into the algorithm.
    pub digest: DigestAlgorithm,
}

impl SigalgInfo {
    /// Primary name.
    pub fn name(&self) -> &'static str {
        self.names[0]
    }

    /// Case-insensitive match against the primary name and aliases.
    pub fn matches(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }
}

macro_rules! sigalg {
    ($digest:ident, $($name:literal),+) => {
        SigalgInfo {
            names: &[$($name),+],
            digest: DigestAlgorithm::$digest,
        }
    };
}

/// Every sigalg known to the crate. Entries whose digest is disabled are
/// filtered out by [`Provider::sigalgs`](crate::Provider::sigalgs).
pub static SIGALGS: [SigalgInfo; 13] = [
    sigalg!(Ripemd160, "RSA-RIPEMD160", "ripemd160WithRSA"),
    sigalg!(Sha1, "RSA-SHA1", "sha1WithRSAEncryption"),
    sigalg!(Sha224, "RSA-SHA2-224", "RSA-SHA224"),
    sigalg!(Sha256, "RSA-SHA2-256", "RSA-SHA256"),
    sigalg!(Sha384, "RSA-SHA2-384", "RSA-SHA384"),
    sigalg!(Sha512, "RSA-SHA2-512", "RSA-SHA512"),
    sigalg!(Sha512_224, "RSA-SHA2-512/224", "RSA-SHA512-224"),
    sigalg!(Sha512_256, "RSA-SHA2-512/256", "RSA-SHA512-256"),
    sigalg!(Sha3_224, "RSA-SHA3-224"),
    sigalg!(Sha3_256, "RSA-SHA3-256"),
    sigalg!(Sha3_384, "RSA-SHA3-384"),
    sigalg!(Sha3_512, "RSA-SHA3-512"),
    sigalg!(Sm3, "RSA-SM3", "SM3WithRSAEncryption"),
];

/// Key types usable with any sigalg.
pub fn query_key_types() -> &'static [&'static str] {
    KEY_TYPES
}

/// A [`SignatureContext`] hard-bound to one sigalg.
#[derive(Clone, Debug)]
pub struct SigalgContext {
    info: &'static SigalgInfo,
    inner: SignatureContext,
}

impl SigalgContext {
    pub(crate) fn new(info: &'static SigalgInfo, inner: SignatureContext) -> Self {
        Self { info, inner }
    }

    /// Table entry this context is bound to.
    pub fn info(&self) -> &'static SigalgInfo {
        self.info
    }

    /// The wrapped context, for inspection.
    pub fn context(&self) -> &SignatureContext {
        &self.inner
    }

    fn init(
        &mut self,
        key: Option<Arc<RsaKey>>,
        operation: Operation,
        params: &SignatureParams,
        desc: &str,
    ) -> Result<()> {
        debug!(sigalg = self.info.name(), ?operation, "sigalg init");
        self.inner
            .sigalg_init(key, operation, self.info.digest, params, desc)
    }

    /// Initializes for signing a precomputed digest.
    pub fn sign_init(&mut self, key: Option<Arc<RsaKey>>, params: &SignatureParams) -> Result<()> {
        self.init(key, Operation::Sign, params, "RSA Sigalg Sign Init")
    }

    /// Initializes for hashing and signing a message.
    pub fn sign_message_init(
        &mut self,
        key: Option<Arc<RsaKey>>,
        params: &SignatureParams,
    ) -> Result<()> {
        self.init(key, Operation::SignMessage, params, "RSA Sigalg Sign Message Init")
    }

    /// Initializes for verifying a signature over a precomputed digest.
    pub fn verify_init(&mut self, key: Option<Arc<RsaKey>>, params: &SignatureParams) -> Result<()> {
        self.init(key, Operation::Verify, params, "RSA Sigalg Verify Init")
    }

    /// Initializes for hashing a message and verifying its signature.
    pub fn verify_message_init(
        &mut self,
        key: Option<Arc<RsaKey>>,
        params: &SignatureParams,
    ) -> Result<()> {
        self.init(key, Operation::VerifyMessage, params, "RSA Sigalg Verify Message Init")
    }

    /// Initializes for recovering the signed digest.
    pub fn verify_recover_init(
        &mut self,
        key: Option<Arc<RsaKey>>,
        params: &SignatureParams,
    ) -> Result<()> {
        self.init(key, Operation::VerifyRecover, params, "RSA Sigalg Verify Recover Init")
    }

    /// Oneshot sign, see [`SignatureContext::sign`].
    pub fn sign(&mut self, sig: Option<&mut [u8]>, tbs: &[u8]) -> Result<usize> {
        self.inner.sign(sig, tbs)
    }

    /// Oneshot verify, see [`SignatureContext::verify`].
    pub fn verify(&mut self, sig: &[u8], tbs: &[u8]) -> Result<()> {
        self.inner.verify(sig, tbs)
    }

    /// See [`SignatureContext::verify_recover`].
    pub fn verify_recover(&mut self, sig: &[u8], out: Option<&mut [u8]>) -> Result<usize> {
        self.inner.verify_recover(sig, out)
    }

    /// Absorbs message bytes.
    pub fn sign_message_update(&mut self, data: &[u8]) -> Result<()> {
        self.inner.update(data)
    }

    /// Produces the signature; `None` queries its size.
    pub fn sign_message_final(&mut self, sig: Option<&mut [u8]>) -> Result<usize> {
        self.inner.sign_message_final(sig)
    }

    /// Absorbs message bytes.
    pub fn verify_message_update(&mut self, data: &[u8]) -> Result<()> {
        self.inner.update(data)
    }

    /// Verifies against the signature staged with [`SigalgContext::set_params`].
    pub fn verify_message_final(&mut self) -> Result<()> {
        self.inner.verify_message_final()
    }

    /// Accepts only [`SignatureParams::signature`], and only for
    /// verify-message.
    pub fn set_params(&mut self, params: &SignatureParams) -> Result<()> {
        self.inner.set_params(params)
    }

    /// Keys `set_params` accepts.
    pub fn settable_params(&self) -> Vec<ParamKey> {
        self.inner.settable_params()
    }

    /// Reads one parameter.
    pub fn get_param(&self, key: ParamKey) -> Result<ParamValue> {
        self.inner.get_param(key)
    }

    /// Keys `get_param` answers.
    pub fn gettable_params(&self) -> Vec<ParamKey> {
        self.inner.gettable_params()
    }

    /// Independent copy, including any running digest state.
    pub fn dup(&self) -> Self {
        Self {
            info: self.info,
            inner: self.inner.dup(),
        }
    }
}
