//! Context parameters: the settable [`SignatureParams`] bundle, gettable
//! [`ParamKey`] / [`ParamValue`] pairs, and the signature
//! `AlgorithmIdentifier` encoder.

use crate::{
    digest::hash_algorithm_identifier, pss::SaltLength, DigestAlgorithm, Error, PadMode, Result,
};
use core::fmt;
use der::{
    asn1::{ContextSpecific, Null, ObjectIdentifier},
    Any, Encode, Tag, TagMode, TagNumber,
};
use spki::AlgorithmIdentifierOwned;

/// `id-RSASSA-PSS`
pub const ID_RSASSA_PSS: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.10");

/// `id-mgf1`
pub const ID_MGF1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.8");

/// Digest bound when PSS is selected and no digest has been chosen.
pub const DEFAULT_DIGEST_NAME: &str = "SHA1";

/// Salt length implied when `RSASSA-PSS-params` omits it.
const DEFAULT_PSS_SALT_LEN: usize = 20;

/// Names of context parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamKey {
    /// DER `AlgorithmIdentifier` of the configured signature (get only).
    AlgorithmId,
    /// Padding mode.
    PadMode,
    /// Message digest.
    Digest,
    /// Property query for the message digest (set only).
    Properties,
    /// MGF1 digest.
    Mgf1Digest,
    /// Property query for the MGF1 digest (set only).
    Mgf1Properties,
    /// PSS salt length.
    SaltLength,
    /// Expected signature for verify-message (set only).
    Signature,
    /// Whether every FIPS check so far passed (get only).
    FipsIndicator,
    /// Whether the context verifies whole messages rather than digests
    /// (get only, FIPS checks enabled).
    FipsVerifyMessage,
    /// Key size check strictness (set only).
    KeyCheck,
    /// Digest check strictness (set only).
    DigestCheck,
    /// X9.31 signing check strictness (set only).
    SignX931PadCheck,
    /// PSS salt length check strictness (set only).
    PssSaltLenCheck,
}

impl ParamKey {
    /// Parameter name.
    pub fn name(self) -> &'static str {
        match self {
            Self::AlgorithmId => "algorithm-id",
            Self::PadMode => "pad-mode",
            Self::Digest => "digest",
            Self::Properties => "properties",
            Self::Mgf1Digest => "mgf1-digest",
            Self::Mgf1Properties => "mgf1-properties",
            Self::SaltLength => "saltlen",
            Self::Signature => "signature",
            Self::FipsIndicator => "fips-indicator",
            Self::FipsVerifyMessage => "verify-message",
            Self::KeyCheck => "key-check",
            Self::DigestCheck => "digest-check",
            Self::SignX931PadCheck => "sign-x931-pad-check",
            Self::PssSaltLenCheck => "rsa-pss-saltlen-check",
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value returned by `get_param`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamValue {
    /// Byte string.
    Octets(Vec<u8>),
    /// Text.
    Utf8(String),
    /// Padding mode.
    PadMode(PadMode),
    /// Salt length request.
    SaltLength(SaltLength),
    /// Flag.
    Bool(bool),
}

/// Pad mode as supplied by a caller, resolved when applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PadModeParam {
    /// Already typed.
    Mode(PadMode),
    /// Name such as `"pss"`.
    Name(String),
    /// Legacy integer identifier.
    Legacy(i32),
}

impl PadModeParam {
    pub(crate) fn resolve(&self) -> Result<PadMode> {
        match self {
            Self::Mode(mode) => Ok(*mode),
            Self::Name(name) => name.parse(),
            Self::Legacy(id) => PadMode::from_legacy(*id),
        }
    }
}

/// Salt length as supplied by a caller, resolved when applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaltLengthParam {
    /// Already typed.
    Policy(SaltLength),
    /// Symbolic name or decimal string.
    Name(String),
    /// Legacy integer encoding.
    Legacy(i32),
}

impl SaltLengthParam {
    pub(crate) fn resolve(&self) -> Result<SaltLength> {
        match self {
            Self::Policy(policy) => Ok(*policy),
            Self::Name(name) => name.parse(),
            Self::Legacy(value) => SaltLength::from_legacy(*value),
        }
    }
}

/// Parameters applied by `set_params` and the init calls.
///
/// ```
/// use rsa_sig_provider::{PadMode, SaltLength, SignatureParams};
///
/// let params = SignatureParams::new()
///     .pad_mode(PadMode::Pss)
///     .digest("SHA2-256")
///     .salt_length(SaltLength::Digest);
/// assert!(!params.is_empty());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignatureParams {
    pub(crate) digest: Option<String>,
    pub(crate) properties: Option<String>,
    pub(crate) pad_mode: Option<PadModeParam>,
    pub(crate) mgf1_digest: Option<String>,
    pub(crate) mgf1_properties: Option<String>,
    pub(crate) salt_length: Option<SaltLengthParam>,
    pub(crate) signature: Option<Vec<u8>>,
    pub(crate) key_check: Option<bool>,
    pub(crate) digest_check: Option<bool>,
    pub(crate) sign_x931_pad_check: Option<bool>,
    pub(crate) pss_saltlen_check: Option<bool>,
}

impl SignatureParams {
    /// Empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Message digest by name.
    pub fn digest(mut self, name: impl Into<String>) -> Self {
        self.digest = Some(name.into());
        self
    }

    /// Property query for the message digest.
    pub fn properties(mut self, query: impl Into<String>) -> Self {
        self.properties = Some(query.into());
        self
    }

    /// Padding mode.
    pub fn pad_mode(mut self, mode: PadMode) -> Self {
        self.pad_mode = Some(PadModeParam::Mode(mode));
        self
    }

    /// Padding mode by name (`pkcs1`, `none`, `x931`, `pss`).
    pub fn pad_mode_name(mut self, name: impl Into<String>) -> Self {
        self.pad_mode = Some(PadModeParam::Name(name.into()));
        self
    }

    /// Padding mode by legacy integer identifier.
    pub fn pad_mode_legacy(mut self, id: i32) -> Self {
        self.pad_mode = Some(PadModeParam::Legacy(id));
        self
    }

    /// MGF1 digest by name.
    pub fn mgf1_digest(mut self, name: impl Into<String>) -> Self {
        self.mgf1_digest = Some(name.into());
        self
    }

    /// Property query for the MGF1 digest.
    pub fn mgf1_properties(mut self, query: impl Into<String>) -> Self {
        self.mgf1_properties = Some(query.into());
        self
    }

    /// PSS salt length.
    pub fn salt_length(mut self, policy: SaltLength) -> Self {
        self.salt_length = Some(SaltLengthParam::Policy(policy));
        self
    }

    /// PSS salt length by name or decimal string.
    pub fn salt_length_name(mut self, name: impl Into<String>) -> Self {
        self.salt_length = Some(SaltLengthParam::Name(name.into()));
        self
    }

    /// PSS salt length in the legacy integer encoding.
    pub fn salt_length_legacy(mut self, value: i32) -> Self {
        self.salt_length = Some(SaltLengthParam::Legacy(value));
        self
    }

    /// Expected signature for a verify-message operation.
    pub fn signature(mut self, sig: impl Into<Vec<u8>>) -> Self {
        self.signature = Some(sig.into());
        self
    }

    /// Strictness of the FIPS key size check.
    pub fn key_check(mut self, strict: bool) -> Self {
        self.key_check = Some(strict);
        self
    }

    /// Strictness of the FIPS digest check.
    pub fn digest_check(mut self, strict: bool) -> Self {
        self.digest_check = Some(strict);
        self
    }

    /// Strictness of the FIPS X9.31 signing check.
    pub fn sign_x931_pad_check(mut self, strict: bool) -> Self {
        self.sign_x931_pad_check = Some(strict);
        self
    }

    /// Strictness of the FIPS PSS salt length check.
    pub fn pss_saltlen_check(mut self, strict: bool) -> Self {
        self.pss_saltlen_check = Some(strict);
        self
    }

    /// Keys of the fields that are present.
    pub fn keys(&self) -> Vec<ParamKey> {
        [
            (self.digest.is_some(), ParamKey::Digest),
            (self.properties.is_some(), ParamKey::Properties),
            (self.pad_mode.is_some(), ParamKey::PadMode),
            (self.mgf1_digest.is_some(), ParamKey::Mgf1Digest),
            (self.mgf1_properties.is_some(), ParamKey::Mgf1Properties),
            (self.salt_length.is_some(), ParamKey::SaltLength),
            (self.signature.is_some(), ParamKey::Signature),
            (self.key_check.is_some(), ParamKey::KeyCheck),
            (self.digest_check.is_some(), ParamKey::DigestCheck),
            (self.sign_x931_pad_check.is_some(), ParamKey::SignX931PadCheck),
            (self.pss_saltlen_check.is_some(), ParamKey::PssSaltLenCheck),
        ]
        .into_iter()
        .filter_map(|(present, key)| present.then_some(key))
        .collect()
    }

    /// Whether no field is present.
    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }
}

/// DER `AlgorithmIdentifier` describing a signature made with `pad`.
///
/// PSS parameters equal to the `RSASSA-PSS-params` defaults (SHA-1,
/// MGF1 with SHA-1, 20 bytes of salt) are omitted and the trailer field is
/// never written.
pub fn signature_algorithm_id(
    pad: PadMode,
    digest: Option<DigestAlgorithm>,
    mgf1_digest: Option<DigestAlgorithm>,
    salt_len: usize,
) -> Result<Vec<u8>> {
    match pad {
        PadMode::Pkcs1v15 => {
            let md = digest.ok_or_else(|| {
                Error::UnsupportedOperation("Algorithm ID generation - no digest".into())
            })?;
            let oid = md.rsa_signature_oid().ok_or_else(|| {
                Error::UnsupportedOperation(format!("Algorithm ID generation - md: {md}"))
            })?;
            let aid = AlgorithmIdentifierOwned {
                oid,
                parameters: Some(Any::encode_from(&Null)?),
            };
            Ok(aid.to_der()?)
        }
        PadMode::Pss => {
            let md = digest.unwrap_or(DigestAlgorithm::Sha1);
            let mgf1 = mgf1_digest.unwrap_or(md);
            let mut fields = Vec::new();
            if md != DigestAlgorithm::Sha1 {
                explicit(TagNumber::N0, hash_algorithm_identifier(md)?).encode_to_vec(&mut fields)?;
            }
            if mgf1 != DigestAlgorithm::Sha1 {
                let mask_gen = AlgorithmIdentifierOwned {
                    oid: ID_MGF1,
                    parameters: Some(Any::encode_from(&hash_algorithm_identifier(mgf1)?)?),
                };
                explicit(TagNumber::N1, mask_gen).encode_to_vec(&mut fields)?;
            }
            if salt_len != DEFAULT_PSS_SALT_LEN {
                let salt = u32::try_from(salt_len).map_err(|_| Error::InternalError)?;
                explicit(TagNumber::N2, salt).encode_to_vec(&mut fields)?;
            }
            let aid = AlgorithmIdentifierOwned {
                oid: ID_RSASSA_PSS,
                parameters: Some(Any::new(Tag::Sequence, fields)?),
            };
            Ok(aid.to_der()?)
        }
        other => Err(Error::UnsupportedOperation(format!(
            "Algorithm ID generation - pad mode: {other}"
        ))),
    }
}

fn explicit<T>(tag_number: TagNumber, value: T) -> ContextSpecific<T> {
    ContextSpecific {
        tag_number,
        tag_mode: TagMode::Explicit,
        value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn keys_lists_present_fields() {
        let params = SignatureParams::new()
            .digest("SHA2-256")
            .salt_length_legacy(-1)
            .key_check(false);
        assert_eq!(
            params.keys(),
            [ParamKey::Digest, ParamKey::SaltLength, ParamKey::KeyCheck]
        );
        assert!(SignatureParams::new().is_empty());
    }

    #[test]
    fn pad_mode_and_salt_params_resolve() {
        assert_eq!(PadModeParam::Name("x931".into()).resolve().unwrap(), PadMode::X931);
        assert!(PadModeParam::Legacy(4).resolve().is_err());
        assert_eq!(
            SaltLengthParam::Name("max".into()).resolve().unwrap(),
            SaltLength::Max
        );
        assert!(matches!(
            SaltLengthParam::Legacy(-5).resolve(),
            Err(Error::InvalidSaltLength(_))
        ));
    }

    #[test]
    fn pkcs1_identifiers() {
        assert_eq!(
            signature_algorithm_id(PadMode::Pkcs1v15, Some(DigestAlgorithm::Sha256), None, 0).unwrap(),
            hex!("300d06092a864886f70d01010b0500")
        );
        assert_eq!(
            signature_algorithm_id(PadMode::Pkcs1v15, Some(DigestAlgorithm::Sha3_256), None, 0)
                .unwrap(),
            hex!("300d060960864801650304030e0500")
        );
    }

    #[test]
    fn pss_identifier_omits_defaults() {
        assert_eq!(
            signature_algorithm_id(PadMode::Pss, Some(DigestAlgorithm::Sha1), None, 20).unwrap(),
            hex!("300d06092a864886f70d01010a3000")
        );
        assert_eq!(
            signature_algorithm_id(
                PadMode::Pss,
                Some(DigestAlgorithm::Sha256),
                Some(DigestAlgorithm::Sha1),
                20
            )
            .unwrap(),
            hex!("301e06092a864886f70d01010a3011a00f300d06096086480165030402010500")
        );
    }

    #[test]
    fn pss_identifier_with_all_fields() {
        assert_eq!(
            signature_algorithm_id(PadMode::Pss, Some(DigestAlgorithm::Sha256), None, 32).unwrap(),
            hex!(
                "304106092a864886f70d01010a3034"
                "a00f300d06096086480165030402010500"
                "a11c301a06092a864886f70d010108300d06096086480165030402010500"
                "a203020120"
            )
        );
    }

    #[test]
    fn other_pad_modes_have_no_identifier() {
        assert!(matches!(
            signature_algorithm_id(PadMode::X931, Some(DigestAlgorithm::Sha256), None, 0),
            Err(Error::UnsupportedOperation(_))
        ));
        assert!(matches!(
            signature_algorithm_id(PadMode::None, None, None, 0),
            Err(Error::UnsupportedOperation(_))
        ));
    }
}
