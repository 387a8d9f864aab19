//! FIPS approval indicator.
//!
//! Each policy check is strict by default: a failure is an error. A caller
//! may relax an individual check, in which case the failure only clears the
//! approval flag that `fips-indicator` reports.

use crate::{DigestAlgorithm, Error, Result};
use tracing::{error, warn};

/// Smallest modulus, in bits, approved for producing signatures.
pub const MIN_SIGNING_KEY_BITS: usize = 2048;
/// Smallest modulus, in bits, still approved for verifying signatures.
pub const MIN_VERIFYING_KEY_BITS: usize = 1024;

/// Individually relaxable policy checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FipsCheck {
    /// Minimum modulus size.
    KeySize,
    /// Approved digest for the operation.
    Digest,
    /// X9.31 padding when signing.
    SignX931Padding,
    /// PSS salt length no larger than the digest.
    PssSaltLength,
}

impl FipsCheck {
    fn index(self) -> usize {
        match self {
            Self::KeySize => 0,
            Self::Digest => 1,
            Self::SignX931Padding => 2,
            Self::PssSaltLength => 3,
        }
    }
}

/// Approval state of one context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FipsIndicator {
    approved: bool,
    strict: [bool; 4],
}

impl Default for FipsIndicator {
    fn default() -> Self {
        Self {
            approved: true,
            strict: [true; 4],
        }
    }
}

impl FipsIndicator {
    /// Marks the next operation approved until a check says otherwise.
    pub fn reset(&mut self) {
        self.approved = true;
    }

    /// Whether every check so far has passed.
    pub fn is_approved(&self) -> bool {
        self.approved
    }

    /// Makes `check` fatal (`true`) or advisory (`false`).
    pub fn set_strict(&mut self, check: FipsCheck, strict: bool) {
        self.strict[check.index()] = strict;
    }

    /// Whether a failure of `check` is fatal.
    pub fn is_strict(&self, check: FipsCheck) -> bool {
        self.strict[check.index()]
    }

    /// Records a failed check. Returns `true` when the caller may continue.
    pub(crate) fn on_unapproved(&mut self, check: FipsCheck, algorithm: &str, what: &str) -> bool {
        if self.is_strict(check) {
            return false;
        }
        self.approved = false;
        warn!(?check, algorithm, what, "unapproved operation");
        true
    }

    /// Modulus size check run at init.
    pub(crate) fn check_key(&mut self, bits: usize, signing: bool, desc: &str) -> Result<()> {
        let minimum = if signing {
            MIN_SIGNING_KEY_BITS
        } else {
            MIN_VERIFYING_KEY_BITS
        };
        if bits >= minimum || self.on_unapproved(FipsCheck::KeySize, desc, "Key size") {
            return Ok(());
        }
        error!(bits, minimum, desc, "key size not approved");
        Err(Error::KeySizeTooSmall {
            key_size: bits,
            minimum,
        })
    }

    /// Digest check run whenever a signing digest is bound.
    pub(crate) fn check_digest(&mut self, md: DigestAlgorithm, signing: bool, desc: &str) -> Result<()> {
        if md.is_fips_approved(signing) || self.on_unapproved(FipsCheck::Digest, desc, md.name()) {
            return Ok(());
        }
        error!(digest = md.name(), desc, "digest not approved");
        Err(Error::DigestNotAllowed(md.name().to_owned()))
    }

    /// X9.31 padding may only verify.
    pub(crate) fn check_x931_sign(&mut self, signing: bool) -> Result<()> {
        if !signing || self.on_unapproved(FipsCheck::SignX931Padding, "RSA Sign set ctx", "X931 Padding") {
            return Ok(());
        }
        Err(Error::InvalidPaddingMode("X9.31 signing is not approved".into()))
    }

    /// PSS salt must satisfy `0 <= sLen <= hLen`.
    pub(crate) fn check_pss_salt(&mut self, salt_len: usize, digest_size: usize, desc: &str) -> Result<()> {
        if salt_len <= digest_size
            || self.on_unapproved(FipsCheck::PssSaltLength, desc, "PSS Salt Length")
        {
            return Ok(());
        }
        Err(Error::InvalidSaltLength(format!(
            "{salt_len} exceeds digest size {digest_size}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_check_refuses() {
        let mut ind = FipsIndicator::default();
        assert!(!ind.on_unapproved(FipsCheck::Digest, "RSA Sign Init", "SHA1"));
        assert!(ind.is_approved());
    }

    #[test]
    fn relaxed_check_clears_approval_until_reset() {
        let mut ind = FipsIndicator::default();
        ind.set_strict(FipsCheck::KeySize, false);
        assert!(ind.on_unapproved(FipsCheck::KeySize, "RSA Sign Init", "Key size"));
        assert!(!ind.is_approved());
        ind.reset();
        assert!(ind.is_approved());
        assert!(!ind.is_strict(FipsCheck::KeySize));
    }

    #[test]
    fn key_size_minimums() {
        let mut ind = FipsIndicator::default();
        assert!(ind.check_key(2048, true, "RSA Sign Init").is_ok());
        assert!(ind.check_key(1024, false, "RSA Verify Init").is_ok());
        assert!(matches!(
            ind.check_key(1024, true, "RSA Sign Init"),
            Err(Error::KeySizeTooSmall { key_size: 1024, minimum: 2048 })
        ));
        assert!(ind.is_approved());
    }

    #[test]
    fn sha1_is_approved_for_verification_only() {
        let mut ind = FipsIndicator::default();
        assert!(ind.check_digest(DigestAlgorithm::Sha1, false, "RSA Verify Init").is_ok());
        assert!(matches!(
            ind.check_digest(DigestAlgorithm::Sha1, true, "RSA Sign Init"),
            Err(Error::DigestNotAllowed(_))
        ));
        ind.set_strict(FipsCheck::Digest, false);
        assert!(ind.check_digest(DigestAlgorithm::Sha1, true, "RSA Sign Init").is_ok());
        assert!(!ind.is_approved());
    }

    #[test]
    fn pss_salt_bound() {
        let mut ind = FipsIndicator::default();
        assert!(ind.check_pss_salt(32, 32, "RSA Sign").is_ok());
        assert!(matches!(
            ind.check_pss_salt(33, 32, "RSA Sign"),
            Err(Error::InvalidSaltLength(_))
        ));
        assert!(matches!(
            ind.check_x931_sign(true),
            Err(Error::InvalidPaddingMode(_))
        ));
        assert!(ind.check_x931_sign(false).is_ok());
    }
}
