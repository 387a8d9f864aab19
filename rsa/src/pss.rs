//! PSS salt-length policy and the EMSA-PSS encoding with an independent
//! MGF1 hash.
//!
//! See [RFC8017 § 9.1].
//!
//! [RFC8017 § 9.1]: https://datatracker.ietf.org/doc/html/rfc8017#section-9.1

use crate::{digest::DigestEngine, Error, Result};
use core::{fmt, str::FromStr};
use digest::DynDigest;
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};

/// Requested salt length: a concrete byte count or a symbolic policy that is
/// resolved against the digest and modulus at sign/verify time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SaltLength {
    /// Exactly this many bytes.
    Fixed(usize),
    /// Same as the digest output size.
    Digest,
    /// As large as the modulus allows.
    Max,
    /// Largest possible when signing, autodetected when verifying.
    Auto,
    /// Largest possible but capped at the digest size when signing,
    /// autodetected when verifying.
    #[default]
    AutoDigestMax,
}

impl SaltLength {
    /// Legacy integer encoding.
    pub const DIGEST: i32 = -1;
    /// Legacy integer encoding.
    pub const AUTO: i32 = -2;
    /// Legacy integer encoding.
    pub const MAX: i32 = -3;
    /// Legacy integer encoding.
    pub const AUTO_DIGEST_MAX: i32 = -4;

    /// Decodes the legacy integer form. Values below `-4` are rejected.
    pub fn from_legacy(value: i32) -> Result<Self> {
        match value {
            Self::DIGEST => Ok(Self::Digest),
            Self::AUTO => Ok(Self::Auto),
            Self::MAX => Ok(Self::Max),
            Self::AUTO_DIGEST_MAX => Ok(Self::AutoDigestMax),
            n => usize::try_from(n)
                .map(Self::Fixed)
                .map_err(|_| Error::InvalidSaltLength(format!("{n}"))),
        }
    }

    /// Legacy integer form.
    pub fn to_legacy(self) -> i64 {
        match self {
            Self::Fixed(n) => i64::try_from(n).unwrap_or(i64::MAX),
            Self::Digest => Self::DIGEST.into(),
            Self::Auto => Self::AUTO.into(),
            Self::Max => Self::MAX.into(),
            Self::AutoDigestMax => Self::AUTO_DIGEST_MAX.into(),
        }
    }

    /// Whether the verifier should detect the salt length from the block.
    pub fn is_autodetect(self) -> bool {
        matches!(self, Self::Auto | Self::AutoDigestMax)
    }
}

impl FromStr for SaltLength {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "digest" => Ok(Self::Digest),
            "max" => Ok(Self::Max),
            "auto" => Ok(Self::Auto),
            "auto-digestmax" => Ok(Self::AutoDigestMax),
            other => other
                .parse::<i32>()
                .map_err(|_| Error::InvalidSaltLength(other.to_owned()))
                .and_then(Self::from_legacy),
        }
    }
}

impl fmt::Display for SaltLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(n) => write!(f, "{n}"),
            Self::Digest => f.write_str("digest"),
            Self::Max => f.write_str("max"),
            Self::Auto => f.write_str("auto"),
            Self::AutoDigestMax => f.write_str("auto-digestmax"),
        }
    }
}

/// Resolves `policy` to a byte count.
///
/// `modulus_bits % 8 == 1` loses one more byte since the encoded block is
/// one byte shorter than the modulus. The result is checked against
/// `min_salt_len` when the key carries one.
pub fn resolve_salt_len(
    policy: SaltLength,
    digest_size: usize,
    modulus_len: usize,
    modulus_bits: usize,
    min_salt_len: Option<usize>,
) -> Result<usize> {
    let (policy, cap) = match policy {
        SaltLength::Digest if digest_size == 0 => {
            return Err(Error::InvalidDigest("digest has no output size".into()))
        }
        SaltLength::Digest => (SaltLength::Fixed(digest_size), None),
        SaltLength::AutoDigestMax => (SaltLength::Max, Some(digest_size)),
        other => (other, None),
    };

    let salt_len = match policy {
        SaltLength::Fixed(n) => n,
        _ => {
            if digest_size == 0 {
                return Err(Error::InvalidDigest("digest has no output size".into()));
            }
            if modulus_len <= 2 || modulus_len - 2 < digest_size {
                return Err(Error::InvalidKey(format!(
                    "{modulus_len}-byte modulus cannot hold a {digest_size}-byte digest"
                )));
            }
            let mut salt_len = modulus_len - digest_size - 2;
            if modulus_bits & 0x7 == 1 {
                salt_len = salt_len.checked_sub(1).ok_or(Error::InternalError)?;
            }
            match cap {
                Some(cap) => salt_len.min(cap),
                None => salt_len,
            }
        }
    };

    match min_salt_len {
        Some(min) if salt_len < min => Err(Error::PssSaltTooSmall {
            min,
            actual: salt_len,
        }),
        _ => Ok(salt_len),
    }
}

/// Checks a salt request against the floor of a restricted RSA-PSS key.
///
/// Used both when the salt length is configured and when a signature is
/// produced, so the two paths cannot disagree. Autodetection is only
/// meaningful for verification; `Max` is checked once resolved.
pub fn check_salt_floor(
    policy: SaltLength,
    digest_size: usize,
    min_salt_len: Option<usize>,
    verifying: bool,
) -> Result<()> {
    let Some(min) = min_salt_len else {
        return Ok(());
    };
    match policy {
        SaltLength::Auto | SaltLength::AutoDigestMax if !verifying => Err(
            Error::InvalidSaltLength("cannot use autodetected salt length".into()),
        ),
        SaltLength::Digest if min > digest_size => Err(Error::PssSaltTooSmall {
            min,
            actual: digest_size,
        }),
        SaltLength::Fixed(n) if n < min => Err(Error::PssSaltTooSmall { min, actual: n }),
        _ => Ok(()),
    }
}

/// Mask generation function MGF1, XORed into `out`.
pub(crate) fn mgf1_xor(out: &mut [u8], digest: &mut dyn DigestEngine, seed: &[u8]) {
    let mut counter = 0u32;
    for chunk in out.chunks_mut(digest.output_size()) {
        digest.update(seed);
        digest.update(&counter.to_be_bytes());
        let mask = digest.finalize_reset();
        for (byte, m) in chunk.iter_mut().zip(mask.iter()) {
            *byte ^= m;
        }
        counter = counter.wrapping_add(1);
    }
}

/// EMSA-PSS-ENCODE into `em`, which must be `ceil(em_bits / 8)` bytes.
pub(crate) fn emsa_pss_encode(
    m_hash: &[u8],
    em_bits: usize,
    salt: &[u8],
    hash: &mut dyn DigestEngine,
    mgf1: &mut dyn DigestEngine,
    em: &mut [u8],
) -> Result<()> {
    let h_len = hash.output_size();
    let s_len = salt.len();
    let em_len = em_bits.div_ceil(8);

    if m_hash.len() != h_len {
        return Err(Error::InvalidDigestLength {
            expected: h_len,
            actual: m_hash.len(),
        });
    }
    if em.len() != em_len || em_len < h_len + s_len + 2 {
        return Err(Error::KeySizeTooSmall {
            key_size: em_len,
            minimum: h_len + s_len + 2,
        });
    }

    em.fill(0);
    let (db, h) = em.split_at_mut(em_len - h_len - 1);
    let h = &mut h[..h_len];

    // H = Hash(0x00 * 8 || mHash || salt)
    hash.update(&[0u8; 8]);
    hash.update(m_hash);
    hash.update(salt);
    h.copy_from_slice(&hash.finalize_reset());

    // DB = PS || 0x01 || salt
    db[em_len - s_len - h_len - 2] = 0x01;
    db[em_len - s_len - h_len - 1..].copy_from_slice(salt);

    mgf1_xor(db, mgf1, h);
    db[0] &= 0xFF >> (8 * em_len - em_bits);

    em[em_len - 1] = 0xBC;
    Ok(())
}

/// EMSA-PSS-VERIFY over `em` (`ceil(em_bits / 8)` bytes).
///
/// `s_len` of `None` detects the salt length from the position of the
/// `0x01` separator. Returns the salt length the block was built with.
pub(crate) fn emsa_pss_verify(
    m_hash: &[u8],
    em: &mut [u8],
    em_bits: usize,
    s_len: Option<usize>,
    hash: &mut dyn DigestEngine,
    mgf1: &mut dyn DigestEngine,
) -> Result<usize> {
    let h_len = hash.output_size();
    let em_len = em.len();

    if m_hash.len() != h_len || em_len != em_bits.div_ceil(8) || em_len < h_len + 2 {
        return Err(Error::VerificationFailed);
    }
    if let Some(s_len) = s_len {
        if em_len < h_len + s_len + 2 {
            return Err(Error::VerificationFailed);
        }
    }
    if em[em_len - 1] != 0xBC {
        return Err(Error::VerificationFailed);
    }

    let (db, h) = em.split_at_mut(em_len - h_len - 1);
    let h = &h[..h_len];

    let top_mask = !(0xFFu8 >> (8 * em_len - em_bits));
    if db[0] & top_mask != 0 {
        return Err(Error::VerificationFailed);
    }

    mgf1_xor(db, mgf1, h);
    db[0] &= !top_mask;

    let (s_len, salt_valid) = match s_len {
        Some(s_len) => (s_len, salt_separator_at(db, em_len, s_len, h_len)),
        None => detect_salt_len(db, em_len, h_len),
    };

    let salt = &db[db.len() - s_len..];
    hash.update(&[0u8; 8]);
    hash.update(m_hash);
    hash.update(salt);
    let h0 = hash.finalize_reset();

    if (salt_valid & h0.ct_eq(h)).into() {
        Ok(s_len)
    } else {
        Err(Error::VerificationFailed)
    }
}

/// DB must be zeros, then `0x01`, then exactly `s_len` salt bytes.
fn salt_separator_at(db: &[u8], em_len: usize, s_len: usize, h_len: usize) -> Choice {
    let (zeroes, rest) = db.split_at(em_len - h_len - s_len - 2);
    let valid: Choice = zeroes
        .iter()
        .fold(Choice::from(1u8), |acc, b| acc & b.ct_eq(&0x00));
    valid & rest[0].ct_eq(&0x01)
}

/// Finds the first `0x01` after the zero padding in constant time.
fn detect_salt_len(db: &[u8], em_len: usize, h_len: usize) -> (usize, Choice) {
    let max_scan = (em_len - h_len - 2) as u32;

    let mut separator = 0u32;
    let mut found = Choice::from(0u8);
    let mut padding_valid = Choice::from(1u8);

    for i in 0..=max_scan {
        let byte = db[i as usize];
        let is_zero = byte.ct_eq(&0x00);
        let is_separator = byte.ct_eq(&0x01);

        let first = is_separator & !found;
        separator = u32::conditional_select(&separator, &i, first);
        found |= first;
        padding_valid &= !(!(is_zero | is_separator) & !found);
    }

    let valid = found & padding_valid;
    let salt_len = u32::conditional_select(&0, &max_scan.wrapping_sub(separator), valid);
    (salt_len as usize, valid)
}
