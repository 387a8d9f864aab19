//! Signature context: owns the state of one sign / verify operation and
//! enforces the order of calls on it.

use crate::{
    config::ProviderConfig,
    digest::{BoundDigest, DigestEngine, MAX_DIGEST_NAME_LEN},
    fips::{FipsCheck, FipsIndicator},
    key::{KeyType, RsaKey},
    padding::{check_digest_compatible, ScratchBuffer, Transform},
    params::{signature_algorithm_id, ParamKey, ParamValue, SignatureParams, DEFAULT_DIGEST_NAME},
    pss::{check_salt_floor, resolve_salt_len, SaltLength},
    DigestAlgorithm, Error, PadMode, Result,
};
use core::{fmt, mem};
use digest::DynDigest;
use std::sync::Arc;
use tracing::{debug, error};
use zeroize::Zeroizing;

/// Operation a context was initialized for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Sign a digest (or a raw payload).
    Sign,
    /// Verify a signature over a digest (or a raw payload).
    Verify,
    /// Recover the signed value from a signature.
    VerifyRecover,
    /// Hash a message, then sign.
    SignMessage,
    /// Hash a message, then verify.
    VerifyMessage,
}

impl Operation {
    /// Sign or sign-message.
    pub fn is_signing(self) -> bool {
        matches!(self, Self::Sign | Self::SignMessage)
    }

    /// Verify or verify-message. Verify-recover is not included.
    pub fn is_verifying(self) -> bool {
        matches!(self, Self::Verify | Self::VerifyMessage)
    }

    fn allows_pss(self) -> bool {
        self.is_signing() || self.is_verifying()
    }
}

/// Lifecycle state of a context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum State {
    /// Never initialized, or the last init failed.
    #[default]
    Fresh,
    /// Initialized; both streaming and oneshot calls are possible.
    Initialized,
    /// Message bytes have been absorbed; only update and final remain.
    Accumulating,
    /// The operation has completed; a new init is required.
    Finalized,
}

/// Which parameter rules apply while initializing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ParamRules {
    Full,
    Sigalg,
}

/// State of one RSA signature operation.
///
/// A context is driven by a single caller at a time; independent contexts
/// may share an [`RsaKey`] across threads.
#[derive(Clone)]
pub struct SignatureContext {
    config: Arc<ProviderConfig>,
    propq: Option<String>,
    key: Option<Arc<RsaKey>>,
    operation: Option<Operation>,
    state: State,

    sigalg: bool,
    allow_md: bool,
    mgf1_md_set: bool,

    md: Option<BoundDigest>,
    md_ctx: Option<Box<dyn DigestEngine>>,
    mgf1_md: Option<BoundDigest>,

    pad_mode: PadMode,
    salt_len: SaltLength,
    min_salt_len: Option<usize>,

    signature: Option<Zeroizing<Vec<u8>>>,
    verify_message: bool,
    fips: FipsIndicator,
    scratch: ScratchBuffer,
}

impl SignatureContext {
    pub(crate) fn new(config: Arc<ProviderConfig>, propq: Option<&str>) -> Self {
        Self {
            config,
            propq: propq.map(str::to_owned),
            key: None,
            operation: None,
            state: State::Fresh,
            sigalg: false,
            allow_md: true,
            mgf1_md_set: false,
            md: None,
            md_ctx: None,
            mgf1_md: None,
            pad_mode: PadMode::Pkcs1v15,
            salt_len: SaltLength::AutoDigestMax,
            min_salt_len: None,
            signature: None,
            verify_message: true,
            fips: FipsIndicator::default(),
            scratch: ScratchBuffer::default(),
        }
    }

    /// Lifecycle state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Operation of the last init.
    pub fn operation(&self) -> Option<Operation> {
        self.operation
    }

    /// Key bound by the last init.
    pub fn key(&self) -> Option<&Arc<RsaKey>> {
        self.key.as_ref()
    }

    /// Current padding mode.
    pub fn pad_mode(&self) -> PadMode {
        self.pad_mode
    }

    /// Bound message digest.
    pub fn digest(&self) -> Option<DigestAlgorithm> {
        self.md.as_ref().map(|md| md.alg)
    }

    /// Bound MGF1 digest.
    pub fn mgf1_digest(&self) -> Option<DigestAlgorithm> {
        self.mgf1_md.as_ref().map(|md| md.alg)
    }

    /// Requested salt length.
    pub fn salt_length(&self) -> SaltLength {
        self.salt_len
    }

    /// Salt floor imposed by a restricted RSA-PSS key.
    pub fn min_salt_length(&self) -> Option<usize> {
        self.min_salt_len
    }

    /// Whether this context is bound to a fixed sigalg.
    pub fn is_sigalg(&self) -> bool {
        self.sigalg
    }

    /// Whether the digest may currently be changed.
    pub fn digest_change_allowed(&self) -> bool {
        self.allow_md
    }

    /// FIPS approval of the current operation.
    pub fn fips_approved(&self) -> bool {
        self.fips.is_approved()
    }

    /// Independent copy, including any running digest state.
    pub fn dup(&self) -> Self {
        debug!(state = ?self.state, operation = ?self.operation, "duplicating RSA signature context");
        self.clone()
    }

    //
    // init
    //

    /// Initializes for signing a digest.
    pub fn sign_init(&mut self, key: Option<Arc<RsaKey>>, params: &SignatureParams) -> Result<()> {
        self.verify_message = true;
        let result = self.init_base(key, Operation::Sign, params, ParamRules::Full, "RSA Sign Init");
        self.settle(result)
    }

    /// Initializes for verifying a signature over a digest.
    pub fn verify_init(&mut self, key: Option<Arc<RsaKey>>, params: &SignatureParams) -> Result<()> {
        self.verify_message = false;
        let result =
            self.init_base(key, Operation::Verify, params, ParamRules::Full, "RSA Verify Init");
        self.settle(result)
    }

    /// Initializes for recovering the signed value from signatures.
    pub fn verify_recover_init(
        &mut self,
        key: Option<Arc<RsaKey>>,
        params: &SignatureParams,
    ) -> Result<()> {
        self.verify_message = false;
        let result = self.init_base(
            key,
            Operation::VerifyRecover,
            params,
            ParamRules::Full,
            "RSA VerifyRecover Init",
        );
        self.settle(result)
    }

    /// Initializes for hashing and signing a message.
    ///
    /// `mdname` binds a digest unless it names the one already bound. The
    /// digest cannot change until the operation is finalized.
    pub fn digest_sign_init(
        &mut self,
        mdname: Option<&str>,
        key: Option<Arc<RsaKey>>,
        params: &SignatureParams,
    ) -> Result<()> {
        self.verify_message = true;
        let result = self.digest_init(mdname, key, params, Operation::SignMessage, "RSA Digest Sign Init");
        self.settle(result)
    }

    /// Initializes for hashing a message and verifying its signature.
    pub fn digest_verify_init(
        &mut self,
        mdname: Option<&str>,
        key: Option<Arc<RsaKey>>,
        params: &SignatureParams,
    ) -> Result<()> {
        self.verify_message = true;
        let result =
            self.digest_init(mdname, key, params, Operation::VerifyMessage, "RSA Digest Verify Init");
        self.settle(result)
    }

    pub(crate) fn sigalg_init(
        &mut self,
        key: Option<Arc<RsaKey>>,
        operation: Operation,
        md: DigestAlgorithm,
        params: &SignatureParams,
        desc: &str,
    ) -> Result<()> {
        let result = self.sigalg_init_inner(key, operation, md, params, desc);
        self.settle(result)
    }

    fn settle(&mut self, result: Result<()>) -> Result<()> {
        match &result {
            Ok(()) => {
                self.state = State::Initialized;
                debug!(
                    operation = ?self.operation,
                    pad_mode = %self.pad_mode,
                    digest = self.md.as_ref().map(|md| md.alg.name()),
                    sigalg = self.sigalg,
                    "RSA signature context initialized"
                );
            }
            Err(err) => {
                self.state = State::Fresh;
                self.md_ctx = None;
                debug!(%err, operation = ?self.operation, "RSA signature init failed");
            }
        }
        result
    }

    fn init_base(
        &mut self,
        key: Option<Arc<RsaKey>>,
        operation: Operation,
        params: &SignatureParams,
        rules: ParamRules,
        desc: &str,
    ) -> Result<()> {
        self.state = State::Fresh;
        self.md_ctx = None;
        let key = match key {
            Some(key) => {
                self.key = Some(Arc::clone(&key));
                key
            }
            None => self.key.clone().ok_or(Error::NoKeySet)?,
        };

        self.operation = Some(operation);
        self.allow_md = true;
        self.salt_len = SaltLength::AutoDigestMax;
        self.min_salt_len = None;

        match key.key_type() {
            KeyType::Rsa => self.pad_mode = PadMode::Pkcs1v15,
            KeyType::RsaPss => {
                self.pad_mode = PadMode::Pss;
                if let Some(restrictions) = key.pss_restrictions() {
                    if !restrictions.digest.is_pss_restriction_digest() {
                        return Err(Error::InvalidDigest(
                            "PSS restrictions lack hash algorithm".into(),
                        ));
                    }
                    if !restrictions.mgf1_digest.is_pss_restriction_digest() {
                        return Err(Error::InvalidDigest(
                            "PSS restrictions lack MGF1 hash algorithm".into(),
                        ));
                    }
                    self.salt_len = SaltLength::Fixed(restrictions.min_salt_len);

                    // MGF1 first so binding the digest does not mirror over it
                    self.setup_mgf1(restrictions.mgf1_digest.name(), None)?;
                    self.setup_md(restrictions.digest.name(), None, desc)?;
                    self.check_parameters(restrictions.min_salt_len)?;
                }
            }
        }

        self.fips.reset();
        match rules {
            ParamRules::Full => self.apply_params(params)?,
            ParamRules::Sigalg => self.apply_sigalg_params(params)?,
        }

        if self.config.fips_checks() {
            self.fips
                .check_key(key.bits(), operation.is_signing(), desc)?;
        }
        Ok(())
    }

    fn digest_init(
        &mut self,
        mdname: Option<&str>,
        key: Option<Arc<RsaKey>>,
        params: &SignatureParams,
        operation: Operation,
        desc: &str,
    ) -> Result<()> {
        self.init_base(key, operation, params, ParamRules::Full, desc)?;

        if let Some(name) = mdname {
            let already_bound = self
                .md
                .as_ref()
                .is_some_and(|md| !name.is_empty() && md.name.eq_ignore_ascii_case(name));
            if !already_bound {
                self.setup_md(name, None, desc)?;
            }
        }

        self.allow_md = false;
        self.start_digest()
    }

    fn sigalg_init_inner(
        &mut self,
        key: Option<Arc<RsaKey>>,
        operation: Operation,
        md: DigestAlgorithm,
        params: &SignatureParams,
        desc: &str,
    ) -> Result<()> {
        self.init_base(key, operation, params, ParamRules::Sigalg, desc)?;

        if self.pad_mode == PadMode::Pss {
            error!(desc, "sigalg contexts do not support RSA-PSS keys");
            return Err(Error::UnsupportedOperation(
                "operation not supported for this key type".into(),
            ));
        }

        self.setup_md(md.name(), None, desc)?;
        self.pad_mode = PadMode::Pkcs1v15;
        self.sigalg = true;
        self.allow_md = false;
        self.start_digest()
    }

    fn start_digest(&mut self) -> Result<()> {
        let md = self
            .md
            .as_ref()
            .ok_or_else(|| Error::InvalidDigest("no digest set".into()))?;
        self.md_ctx = Some(md.alg.new_engine()?);
        Ok(())
    }

    //
    // digest binding
    //

    fn signing(&self) -> bool {
        self.operation.is_some_and(Operation::is_signing)
    }

    fn effective_properties(&self, props: Option<&str>) -> Option<String> {
        props.map(str::to_owned).or_else(|| self.propq.clone())
    }

    /// Padding rules for a digest about to be bound. `candidate` is the
    /// digest whose identity the pad mode cares about; the two requested
    /// names are what a restricted RSA-PSS key must already have bound.
    fn check_padding(
        &self,
        candidate: Option<DigestAlgorithm>,
        requested_md: Option<DigestAlgorithm>,
        requested_mgf1: Option<DigestAlgorithm>,
    ) -> Result<()> {
        check_digest_compatible(self.pad_mode, candidate)?;
        if self.pad_mode == PadMode::Pss && self.min_salt_len.is_some() {
            let md_differs = requested_md.is_some_and(|alg| Some(alg) != self.digest());
            let mgf1_differs = requested_mgf1.is_some_and(|alg| Some(alg) != self.mgf1_digest());
            if md_differs || mgf1_differs {
                error!("digest differs from the RSA-PSS key restrictions");
                return Err(Error::DigestNotAllowed(
                    "digest differs from the RSA-PSS key restrictions".into(),
                ));
            }
        }
        Ok(())
    }

    fn setup_md(&mut self, name: &str, props: Option<&str>, desc: &str) -> Result<()> {
        let alg = self.config.resolve_digest(name)?;
        if alg.is_xof() {
            return Err(Error::XofNotAllowed);
        }
        if alg.rsa_signature_oid().is_none() {
            return Err(Error::DigestNotAllowed(format!("digest={name}")));
        }
        if self.config.fips_checks() {
            let signing = self.signing();
            self.fips.check_digest(alg, signing, desc)?;
        }
        self.check_padding(Some(alg), Some(alg), None)?;
        if name.len() >= MAX_DIGEST_NAME_LEN {
            return Err(Error::InvalidDigest(format!(
                "{name} exceeds name buffer length"
            )));
        }

        if !self.allow_md {
            if let Some(md) = &self.md {
                if md.alg != alg {
                    error!(requested = name, bound = %md.name, "digest change not allowed");
                    return Err(Error::DigestNotAllowed(format!("digest {name} != {}", md.name)));
                }
            }
            return Ok(());
        }

        let props = self.effective_properties(props);
        if !self.mgf1_md_set {
            self.mgf1_md = Some(BoundDigest::new(alg, name, props.as_deref()));
        }
        self.md_ctx = None;
        self.md = Some(BoundDigest::new(alg, name, props.as_deref()));
        debug!(digest = name, properties = props.as_deref(), "digest bound");
        Ok(())
    }

    fn setup_mgf1(&mut self, name: &str, props: Option<&str>) -> Result<()> {
        let alg = self.config.resolve_digest(name)?;
        if alg.rsa_signature_oid().is_none() {
            return Err(Error::DigestNotAllowed(format!("digest={name}")));
        }
        self.check_padding(Some(alg), None, Some(alg))?;
        if name.len() >= MAX_DIGEST_NAME_LEN {
            return Err(Error::InvalidDigest(format!(
                "{name} exceeds name buffer length"
            )));
        }

        let props = self.effective_properties(props);
        self.mgf1_md = Some(BoundDigest::new(alg, name, props.as_deref()));
        self.mgf1_md_set = true;
        debug!(mgf1_digest = name, properties = props.as_deref(), "MGF1 digest bound");
        Ok(())
    }

    /// The floor of a restricted key must leave room for the digest.
    fn check_parameters(&mut self, min_salt_len: usize) -> Result<()> {
        if self.pad_mode != PadMode::Pss {
            return Ok(());
        }
        let key = self.key.as_deref().ok_or(Error::NoKeySet)?;
        let md_size = self.digest().map_or(0, DigestAlgorithm::output_size);
        let mut max_salt_len = key.size().saturating_sub(md_size);
        if key.bits() & 0x7 == 1 {
            max_salt_len = max_salt_len.saturating_sub(1);
        }
        if min_salt_len > max_salt_len {
            return Err(Error::InvalidSaltLength(format!(
                "minimum {min_salt_len} exceeds maximum {max_salt_len}"
            )));
        }
        self.min_salt_len = Some(min_salt_len);
        Ok(())
    }

    //
    // parameters
    //

    /// Applies `params`. On error the configuration is left unchanged.
    pub fn set_params(&mut self, params: &SignatureParams) -> Result<()> {
        if self.operation.is_none() {
            return Err(Error::NoKeySet);
        }
        if params.is_empty() {
            return Ok(());
        }

        let mut next = self.clone();
        if self.sigalg {
            next.apply_sigalg_params(params)?;
        } else {
            next.apply_params(params)?;
        }
        mem::swap(&mut next.scratch, &mut self.scratch);
        *self = next;
        Ok(())
    }

    fn apply_params(&mut self, params: &SignatureParams) -> Result<()> {
        if params.is_empty() {
            return Ok(());
        }
        let operation = self.operation.ok_or(Error::NoKeySet)?;
        let key = self.key.clone().ok_or(Error::NoKeySet)?;

        for (setting, check) in [
            (params.key_check, FipsCheck::KeySize),
            (params.digest_check, FipsCheck::Digest),
            (params.sign_x931_pad_check, FipsCheck::SignX931Padding),
            (params.pss_saltlen_check, FipsCheck::PssSaltLength),
        ] {
            if let Some(strict) = setting {
                self.fips.set_strict(check, strict);
            }
        }

        let mut pad_mode = self.pad_mode;
        let mut salt_len = self.salt_len;

        if let Some(requested) = &params.pad_mode {
            let mode = requested.resolve()?;
            match mode {
                PadMode::Pss => {
                    if !operation.allows_pss() {
                        return Err(Error::InvalidPaddingMode(
                            "PSS padding only allowed for sign and verify operations".into(),
                        ));
                    }
                }
                PadMode::Pkcs1v15 | PadMode::None | PadMode::X931 => {
                    if mode == PadMode::X931 && self.config.fips_checks() {
                        if key.bits() & 0xFF != 0 {
                            return Err(Error::InvalidKey(format!(
                                "X9.31 needs a multiple of 256 bits, key has {}",
                                key.bits()
                            )));
                        }
                        self.fips.check_x931_sign(operation.is_signing())?;
                    }
                    if key.key_type() != KeyType::Rsa {
                        return Err(Error::InvalidPaddingMode(format!(
                            "{mode} padding not allowed with RSA-PSS"
                        )));
                    }
                }
            }
            pad_mode = mode;
        }

        if let Some(requested) = &params.salt_length {
            if pad_mode != PadMode::Pss {
                return Err(Error::UnsupportedOperation(
                    "PSS saltlen can only be specified if PSS padding has been specified first"
                        .into(),
                ));
            }
            salt_len = requested.resolve()?;
            let md_size = self.digest().map_or(0, DigestAlgorithm::output_size);
            check_salt_floor(salt_len, md_size, self.min_salt_len, operation.is_verifying())?;
        }

        if params.mgf1_digest.is_some() && pad_mode != PadMode::Pss {
            return Err(Error::InvalidMgf1Digest);
        }

        self.salt_len = salt_len;
        self.pad_mode = pad_mode;

        let mut md_name = params.digest.as_deref();
        if self.md.is_none() && md_name.is_none() && pad_mode == PadMode::Pss {
            md_name = Some(DEFAULT_DIGEST_NAME);
        }

        if let Some(name) = &params.mgf1_digest {
            self.setup_mgf1(name, params.mgf1_properties.as_deref())?;
        }

        match md_name {
            Some(name) => self.setup_md(name, params.properties.as_deref(), "RSA Sign Set Ctx")?,
            None => self.check_padding(self.digest(), None, None)?,
        }

        if let Some(sig) = &params.signature {
            self.stage_signature(sig)?;
        }
        debug!(pad_mode = %self.pad_mode, salt_len = %self.salt_len, "RSA signature parameters set");
        Ok(())
    }

    fn apply_sigalg_params(&mut self, params: &SignatureParams) -> Result<()> {
        if let Some(key) = params.keys().into_iter().find(|key| *key != ParamKey::Signature) {
            return Err(Error::UnsupportedOperation(format!(
                "{key} cannot be set on a sigalg context"
            )));
        }
        if let Some(sig) = &params.signature {
            self.stage_signature(sig)?;
        }
        Ok(())
    }

    fn stage_signature(&mut self, sig: &[u8]) -> Result<()> {
        if self.operation != Some(Operation::VerifyMessage) {
            return Err(Error::UnsupportedOperation(
                "signature can only be set for verify-message".into(),
            ));
        }
        self.signature = Some(Zeroizing::new(sig.to_vec()));
        Ok(())
    }

    /// Keys `set_params` currently accepts.
    pub fn settable_params(&self) -> Vec<ParamKey> {
        let verify_message = self.operation == Some(Operation::VerifyMessage);
        if self.sigalg {
            return if verify_message {
                vec![ParamKey::Signature]
            } else {
                Vec::new()
            };
        }

        let mut keys = Vec::new();
        if self.allow_md {
            keys.extend([ParamKey::Digest, ParamKey::Properties]);
        }
        keys.extend([
            ParamKey::PadMode,
            ParamKey::Mgf1Digest,
            ParamKey::Mgf1Properties,
            ParamKey::SaltLength,
        ]);
        if verify_message {
            keys.push(ParamKey::Signature);
        }
        keys.extend([
            ParamKey::KeyCheck,
            ParamKey::DigestCheck,
            ParamKey::PssSaltLenCheck,
            ParamKey::SignX931PadCheck,
        ]);
        keys
    }

    /// Keys `get_param` answers.
    pub fn gettable_params(&self) -> Vec<ParamKey> {
        let mut keys = vec![
            ParamKey::AlgorithmId,
            ParamKey::PadMode,
            ParamKey::Digest,
            ParamKey::Mgf1Digest,
            ParamKey::SaltLength,
        ];
        if self.config.fips_checks() {
            keys.push(ParamKey::FipsVerifyMessage);
        }
        keys.push(ParamKey::FipsIndicator);
        keys
    }

    /// Reads one parameter.
    pub fn get_param(&self, key: ParamKey) -> Result<ParamValue> {
        let name_of = |md: &Option<BoundDigest>| {
            ParamValue::Utf8(md.as_ref().map(|md| md.name.clone()).unwrap_or_default())
        };
        Ok(match key {
            ParamKey::AlgorithmId => ParamValue::Octets(self.algorithm_id()?),
            ParamKey::PadMode => ParamValue::PadMode(self.pad_mode),
            ParamKey::Digest => name_of(&self.md),
            ParamKey::Mgf1Digest => name_of(&self.mgf1_md),
            ParamKey::SaltLength => ParamValue::SaltLength(self.salt_len),
            ParamKey::FipsIndicator => ParamValue::Bool(self.fips.is_approved()),
            ParamKey::FipsVerifyMessage if self.config.fips_checks() => {
                ParamValue::Bool(self.verify_message)
            }
            other => {
                return Err(Error::UnsupportedOperation(format!("{other} is not gettable")))
            }
        })
    }

    /// DER `AlgorithmIdentifier` of the signature this context produces.
    pub fn algorithm_id(&self) -> Result<Vec<u8>> {
        let salt_len = match self.pad_mode {
            PadMode::Pss => {
                let key = self.key.as_deref().ok_or(Error::NoKeySet)?;
                let md_size = self.digest().map_or(0, DigestAlgorithm::output_size);
                resolve_salt_len(self.salt_len, md_size, key.size(), key.bits(), self.min_salt_len)?
            }
            _ => 0,
        };
        signature_algorithm_id(self.pad_mode, self.digest(), self.mgf1_digest(), salt_len)
    }

    //
    // lifecycle calls
    //

    fn transform(&mut self) -> Result<Transform<'_>> {
        let key = self.key.as_deref().ok_or(Error::NoKeySet)?;
        Ok(Transform {
            key,
            pad: self.pad_mode,
            digest: self.md.as_ref().map(|md| md.alg),
            mgf1: self.mgf1_md.as_ref().map(|md| md.alg),
            salt: self.salt_len,
            min_salt: self.min_salt_len,
            fips: if self.config.fips_checks() {
                Some(&mut self.fips)
            } else {
                None
            },
            scratch: &mut self.scratch,
        })
    }

    fn key_size(&self) -> Result<usize> {
        self.key.as_deref().map(RsaKey::size).ok_or(Error::NoKeySet)
    }

    fn require_operation(&self, expected: Operation) -> Result<()> {
        if self.operation == Some(expected) {
            Ok(())
        } else {
            Err(Error::UnsupportedOperation(format!(
                "context was initialized for {:?}, not {expected:?}",
                self.operation
            )))
        }
    }

    /// Absorbs message bytes.
    pub(crate) fn update(&mut self, data: &[u8]) -> Result<()> {
        if !matches!(self.state, State::Initialized | State::Accumulating) {
            return Err(Error::UpdateOutOfOrder);
        }
        let md_ctx = self
            .md_ctx
            .as_mut()
            .ok_or_else(|| Error::UnsupportedOperation("no message digest in progress".into()))?;
        md_ctx.update(data);
        self.state = State::Accumulating;
        Ok(())
    }

    fn check_final(&self) -> Result<()> {
        if !matches!(self.state, State::Initialized | State::Accumulating) {
            return Err(Error::FinalOutOfOrder);
        }
        if self.md_ctx.is_none() {
            return Err(Error::UnsupportedOperation("no message digest in progress".into()));
        }
        Ok(())
    }

    fn finish_digest(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let md_ctx = self.md_ctx.as_mut().ok_or(Error::InternalError)?;
        let digest = Zeroizing::new(md_ctx.finalize_reset().into_vec());
        self.state = State::Finalized;
        Ok(digest)
    }

    /// Finishes a sign-message operation. `sig` of `None` queries the
    /// signature size without consuming the running digest.
    pub(crate) fn sign_message_final(&mut self, sig: Option<&mut [u8]>) -> Result<usize> {
        self.check_final()?;
        self.require_operation(Operation::SignMessage)?;
        let k = self.key_size()?;
        let Some(sig) = sig else {
            return Ok(k);
        };
        if sig.len() < k {
            return Err(Error::InvalidSignatureSize {
                size: sig.len(),
                expected: k,
            });
        }
        let digest = self.finish_digest()?;
        self.transform()?.sign(&digest, sig)
    }

    /// Finishes a verify-message operation against the staged signature.
    pub(crate) fn verify_message_final(&mut self) -> Result<()> {
        self.check_final()?;
        self.require_operation(Operation::VerifyMessage)?;
        let digest = self.finish_digest()?;
        let sig = self.signature.clone().ok_or(Error::VerificationFailed)?;
        self.transform()?.verify(&sig, &digest)
    }

    /// Oneshot sign. For sign-message contexts `tbs` is the message,
    /// otherwise it is the digest (or raw payload when no digest is bound).
    /// `sig` of `None` returns the signature size.
    pub fn sign(&mut self, sig: Option<&mut [u8]>, tbs: &[u8]) -> Result<usize> {
        if self.state != State::Initialized {
            return Err(Error::OneshotOutOfOrder);
        }
        let k = self.key_size()?;
        match self.operation {
            Some(Operation::SignMessage) => {
                let Some(sig) = sig else {
                    return self.sign_message_final(None);
                };
                if sig.len() < k {
                    return Err(Error::InvalidSignatureSize {
                        size: sig.len(),
                        expected: k,
                    });
                }
                self.update(tbs)?;
                self.sign_message_final(Some(sig))
            }
            Some(Operation::Sign) => {
                let Some(sig) = sig else {
                    return Ok(k);
                };
                if sig.len() < k {
                    return Err(Error::InvalidSignatureSize {
                        size: sig.len(),
                        expected: k,
                    });
                }
                self.state = State::Finalized;
                self.transform()?.sign(tbs, sig)
            }
            other => Err(Error::UnsupportedOperation(format!(
                "sign on a context initialized for {other:?}"
            ))),
        }
    }

    /// Oneshot verify; see [`SignatureContext::sign`] for what `tbs` is.
    pub fn verify(&mut self, sig: &[u8], tbs: &[u8]) -> Result<()> {
        if self.state != State::Initialized {
            return Err(Error::OneshotOutOfOrder);
        }
        match self.operation {
            Some(Operation::VerifyMessage) => {
                self.stage_signature(sig)?;
                self.update(tbs)?;
                self.verify_message_final()
            }
            Some(Operation::Verify) => {
                self.state = State::Finalized;
                self.transform()?.verify(sig, tbs)
            }
            other => Err(Error::UnsupportedOperation(format!(
                "verify on a context initialized for {other:?}"
            ))),
        }
    }

    /// Recovers the signed value into `out`, returning its length. `out` of
    /// `None` returns the largest possible length. May be repeated.
    pub fn verify_recover(&mut self, sig: &[u8], out: Option<&mut [u8]>) -> Result<usize> {
        if self.state == State::Fresh {
            return Err(Error::UnsupportedOperation(
                "verify_recover requires verify_recover_init".into(),
            ));
        }
        self.require_operation(Operation::VerifyRecover)?;
        let Some(out) = out else {
            return self.key_size();
        };
        self.transform()?.verify_recover(sig, out)
    }

    /// Absorbs message bytes of a digest-sign operation.
    pub fn digest_sign_update(&mut self, data: &[u8]) -> Result<()> {
        self.reject_sigalg()?;
        self.update(data)
    }

    /// Finishes a digest-sign operation. The digest may be changed again
    /// afterwards, whatever the outcome.
    pub fn digest_sign_final(&mut self, sig: Option<&mut [u8]>) -> Result<usize> {
        self.reject_sigalg()?;
        let result = self.sign_message_final(sig);
        self.allow_md = true;
        result
    }

    /// Absorbs message bytes of a digest-verify operation.
    pub fn digest_verify_update(&mut self, data: &[u8]) -> Result<()> {
        self.reject_sigalg()?;
        self.update(data)
    }

    /// Finishes a digest-verify operation against `sig`.
    pub fn digest_verify_final(&mut self, sig: &[u8]) -> Result<()> {
        self.reject_sigalg()?;
        let result = self
            .stage_signature(sig)
            .and_then(|()| self.verify_message_final());
        self.allow_md = true;
        result
    }

    fn reject_sigalg(&self) -> Result<()> {
        if self.sigalg {
            Err(Error::UnsupportedOperation(
                "digest sign / verify is not available on sigalg contexts".into(),
            ))
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for SignatureContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureContext")
            .field("operation", &self.operation)
            .field("state", &self.state)
            .field("pad_mode", &self.pad_mode)
            .field("digest", &self.md)
            .field("mgf1_digest", &self.mgf1_md)
            .field("salt_len", &self.salt_len)
            .field("min_salt_len", &self.min_salt_len)
            .field("sigalg", &self.sigalg)
            .field("allow_md", &self.allow_md)
            .field("streaming", &self.md_ctx.is_some())
            .field("scratch", &self.scratch)
            .finish_non_exhaustive()
    }
}
