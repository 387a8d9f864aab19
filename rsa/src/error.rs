//! Error types.

/// Errors raised by signature contexts and the padding engines behind them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No key was supplied to init and none is held from a previous init.
    #[error("no key set")]
    NoKeySet,
    /// The digest could not be resolved, or its name is unusable.
    #[error("invalid digest: {0}")]
    InvalidDigest(String),
    /// The digest resolved but may not be used here.
    #[error("digest not allowed: {0}")]
    DigestNotAllowed(String),
    /// Extendable-output functions are never accepted for RSA signatures.
    #[error("XOF digests are not allowed")]
    XofNotAllowed,
    /// The padding mode is unknown or illegal for this key or operation.
    #[error("illegal or unsupported padding mode: {0}")]
    InvalidPaddingMode(String),
    /// The bound digest has no X9.31 hash identifier.
    #[error("digest has no X9.31 hash identifier")]
    InvalidX931Digest,
    /// The salt length request is malformed or not permitted.
    #[error("invalid salt length: {0}")]
    InvalidSaltLength(String),
    /// The salt length is below the floor embedded in an RSA-PSS key.
    #[error("PSS salt length too small: minimum {min}, actual {actual}")]
    PssSaltTooSmall {
        /// Minimum salt length imposed by the key.
        min: usize,
        /// Salt length that would have been used.
        actual: usize,
    },
    /// The value to be signed does not have the bound digest's size.
    #[error("invalid digest length: expected {expected}, got {actual}")]
    InvalidDigestLength {
        /// Output size of the bound digest.
        expected: usize,
        /// Length supplied by the caller.
        actual: usize,
    },
    /// The signature buffer cannot hold a modulus-sized signature.
    #[error("invalid signature size: buffer is {size}, should be at least {expected}")]
    InvalidSignatureSize {
        /// Capacity supplied by the caller.
        size: usize,
        /// Modulus size in bytes.
        expected: usize,
    },
    /// The output buffer for a recovered value is too small.
    #[error("output buffer too small: buffer is {size}, should be {expected}")]
    OutputBufferTooSmall {
        /// Capacity supplied by the caller.
        size: usize,
        /// Bytes that need to be written.
        expected: usize,
    },
    /// The RSA modulus is too small for the requested operation.
    #[error("RSA key size {key_size} too small, expected minimum {minimum}")]
    KeySizeTooSmall {
        /// Key size (bytes for padding limits, bits for policy checks).
        key_size: usize,
        /// Required minimum in the same unit.
        minimum: usize,
    },
    /// The key cannot be used as requested.
    #[error("invalid key: {0}")]
    InvalidKey(String),
    /// A recovered X9.31 trailer names a different hash than the bound one.
    #[error("algorithm mismatch")]
    AlgorithmMismatch,
    /// `update` was called outside of an accumulating message operation.
    #[error("update call out of order")]
    UpdateOutOfOrder,
    /// `final` was called twice or before init.
    #[error("final call out of order")]
    FinalOutOfOrder,
    /// A oneshot call was mixed with streaming or repeated.
    #[error("oneshot call out of order")]
    OneshotOutOfOrder,
    /// The call is not available on this context.
    #[error("operation not supported: {0}")]
    UnsupportedOperation(String),
    /// MGF1 digest supplied while the padding mode is not PSS.
    #[error("MGF1 digest is only valid with PSS padding")]
    InvalidMgf1Digest,
    /// Signature verification failed.
    #[error("signature verification failed")]
    VerificationFailed,
    /// The RSA primitive or a padding codec failed.
    #[error("RSA primitive failure: {0}")]
    PrimitiveFailure(String),
    /// An internal invariant was violated.
    #[error("internal error")]
    InternalError,
    /// Encoding an algorithm identifier failed.
    #[error("ASN.1 error: {0}")]
    Asn1(#[from] der::Error),
}

impl From<rsa::Error> for Error {
    fn from(err: rsa::Error) -> Self {
        Error::PrimitiveFailure(err.to_string())
    }
}

impl From<Error> for signature::Error {
    fn from(err: Error) -> Self {
        signature::Error::from_source(err)
    }
}

/// Result type used by this crate.
pub type Result<T> = core::result::Result<T, Error>;
