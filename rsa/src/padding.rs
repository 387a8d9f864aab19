//! Padding selection and the per-mode signature transforms.
//!
//! Block formats follow [RFC8017 § 9.2] for PKCS#1 v1.5 and ANSI X9.31
//! for the X9.31 mode. PSS encoding lives in [`crate::pss`].
//!
//! [RFC8017 § 9.2]: https://datatracker.ietf.org/doc/html/rfc8017#section-9.2

use crate::{
    digest::digest_info,
    fips::FipsIndicator,
    key::RsaKey,
    pss::{check_salt_floor, emsa_pss_encode, emsa_pss_verify, resolve_salt_len, SaltLength},
    DigestAlgorithm, Error, Result,
};
use core::{
    fmt,
    ops::{Deref, DerefMut},
    str::FromStr,
};
use rand_core::{OsRng, RngCore};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

/// Signature padding mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PadMode {
    /// PKCS#1 v1.5 (block type 1).
    Pkcs1v15,
    /// Raw RSA, no padding.
    None,
    /// ANSI X9.31.
    X931,
    /// RSASSA-PSS.
    Pss,
}

const OAEP_NAME: &str = "oaep";
const OAEP_LEGACY_ID: i32 = 4;

impl PadMode {
    /// Parameter name of this mode.
    pub fn name(self) -> &'static str {
        match self {
            Self::Pkcs1v15 => "pkcs1",
            Self::None => "none",
            Self::X931 => "x931",
            Self::Pss => "pss",
        }
    }

    /// Legacy integer identifier.
    pub fn legacy_id(self) -> i32 {
        match self {
            Self::Pkcs1v15 => 1,
            Self::None => 3,
            Self::X931 => 5,
            Self::Pss => 6,
        }
    }

    /// Decodes the legacy integer identifier.
    pub fn from_legacy(id: i32) -> Result<Self> {
        match id {
            1 => Ok(Self::Pkcs1v15),
            3 => Ok(Self::None),
            5 => Ok(Self::X931),
            6 => Ok(Self::Pss),
            OAEP_LEGACY_ID => Err(oaep_rejected()),
            other => Err(Error::InvalidPaddingMode(format!("unknown padding mode {other}"))),
        }
    }
}

fn oaep_rejected() -> Error {
    Error::InvalidPaddingMode("OAEP padding not allowed for signing / verifying".into())
}

impl FromStr for PadMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pkcs1" => Ok(Self::Pkcs1v15),
            "none" => Ok(Self::None),
            "x931" => Ok(Self::X931),
            "pss" => Ok(Self::Pss),
            OAEP_NAME => Err(oaep_rejected()),
            other => Err(Error::InvalidPaddingMode(format!("unknown padding mode {other}"))),
        }
    }
}

impl TryFrom<i32> for PadMode {
    type Error = Error;

    fn try_from(id: i32) -> Result<Self> {
        Self::from_legacy(id)
    }
}

impl fmt::Display for PadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Digest rules of a pad mode that hold regardless of the key.
///
/// Raw RSA must never carry a hash identity and X9.31 needs a trailer byte
/// for the digest.
pub(crate) fn check_digest_compatible(pad: PadMode, digest: Option<DigestAlgorithm>) -> Result<()> {
    match pad {
        PadMode::None if digest.is_some() => Err(Error::InvalidPaddingMode(
            "no padding cannot be combined with a digest".into(),
        )),
        PadMode::X931 if digest.and_then(DigestAlgorithm::x931_hash_id).is_none() => {
            Err(Error::InvalidX931Digest)
        }
        _ => Ok(()),
    }
}

/// `00 01 FF..FF 00 || payload` into `em`, which is the modulus size.
pub(crate) fn pkcs1v15_type1_pad(payload: &[u8], em: &mut [u8]) -> Result<()> {
    let k = em.len();
    let t_len = payload.len();
    if k < t_len + 11 {
        return Err(Error::PrimitiveFailure("data too large for key size".into()));
    }
    em.fill(0xFF);
    em[0] = 0x00;
    em[1] = 0x01;
    em[k - t_len - 1] = 0x00;
    em[k - t_len..].copy_from_slice(payload);
    Ok(())
}

/// Strips a type 1 block, returning the payload.
pub(crate) fn pkcs1v15_type1_unpad(em: &[u8]) -> Result<&[u8]> {
    let bad = || Error::PrimitiveFailure("invalid PKCS#1 type 1 block".into());
    if em.len() < 11 || em[0] != 0x00 || em[1] != 0x01 {
        return Err(bad());
    }
    let ps_len = em[2..].iter().take_while(|&&b| b == 0xFF).count();
    let sep = 2 + ps_len;
    if ps_len < 8 || sep >= em.len() || em[sep] != 0x00 {
        return Err(bad());
    }
    Ok(&em[sep + 1..])
}

/// X9.31 block `6B BB..BB BA || payload || CC` into `em`, or
/// `6A || payload || CC` when the payload leaves no room for padding.
pub(crate) fn x931_pad(payload: &[u8], em: &mut [u8]) -> Result<()> {
    let k = em.len();
    let Some(j) = k.checked_sub(payload.len() + 2) else {
        return Err(Error::PrimitiveFailure("data too large for key size".into()));
    };
    let start = if j == 0 {
        em[0] = 0x6A;
        1
    } else {
        em[0] = 0x6B;
        em[1..j].fill(0xBB);
        em[j] = 0xBA;
        j + 1
    };
    em[start..start + payload.len()].copy_from_slice(payload);
    em[k - 1] = 0xCC;
    Ok(())
}

/// Strips an X9.31 block, returning the payload.
///
/// A `6B` header followed directly by `BA` is accepted: it is what
/// [`x931_pad`] emits when exactly one padding byte fits.
pub(crate) fn x931_unpad(em: &[u8]) -> Result<&[u8]> {
    let bad = |what: &str| Error::PrimitiveFailure(format!("invalid X9.31 {what}"));
    if em.len() < 2 {
        return Err(bad("block"));
    }
    let body = match em[0] {
        0x6A => &em[1..],
        0x6B => {
            let fill = em[1..].iter().take_while(|&&b| b == 0xBB).count();
            match em.get(1 + fill) {
                Some(0xBA) => &em[2 + fill..],
                _ => return Err(bad("padding")),
            }
        }
        _ => return Err(bad("header")),
    };
    match body.split_last() {
        Some((0xCC, payload)) => Ok(payload),
        _ => Err(bad("trailer")),
    }
}

/// Modulus-sized working buffer, allocated on first use and reused for the
/// lifetime of its context. Contents are wiped after every use and on drop.
#[derive(Default)]
pub(crate) struct ScratchBuffer(Option<Zeroizing<Vec<u8>>>);

impl ScratchBuffer {
    /// Borrows `len` bytes, zeroed again when the guard drops.
    pub(crate) fn take(&mut self, len: usize) -> ScratchGuard<'_> {
        let buf = self.0.get_or_insert_with(|| Zeroizing::new(Vec::new()));
        if buf.len() < len {
            buf.resize(len, 0);
        }
        ScratchGuard(&mut buf[..len])
    }

    pub(crate) fn is_allocated(&self) -> bool {
        self.0.is_some()
    }
}

// Duplicated contexts get their own buffer.
impl Clone for ScratchBuffer {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl fmt::Debug for ScratchBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScratchBuffer")
            .field("allocated", &self.is_allocated())
            .finish()
    }
}

/// Borrowed view into a [`ScratchBuffer`].
pub(crate) struct ScratchGuard<'a>(&'a mut [u8]);

impl Deref for ScratchGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.0
    }
}

impl DerefMut for ScratchGuard<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.0
    }
}

impl Drop for ScratchGuard<'_> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// One sign / verify / verify-recover call, borrowing the context state it
/// needs.
pub(crate) struct Transform<'a> {
    pub(crate) key: &'a RsaKey,
    pub(crate) pad: PadMode,
    pub(crate) digest: Option<DigestAlgorithm>,
    pub(crate) mgf1: Option<DigestAlgorithm>,
    pub(crate) salt: SaltLength,
    pub(crate) min_salt: Option<usize>,
    /// Present when FIPS policy checks are enabled.
    pub(crate) fips: Option<&'a mut FipsIndicator>,
    pub(crate) scratch: &'a mut ScratchBuffer,
}

impl Transform<'_> {
    fn check_fips_salt(&mut self, salt_len: usize, digest_size: usize, desc: &str) -> Result<()> {
        match self.fips.as_deref_mut() {
            Some(fips) => fips.check_pss_salt(salt_len, digest_size, desc),
            None => Ok(()),
        }
    }

    /// Produces a modulus-sized signature over `tbs` into `sig`.
    ///
    /// With a bound digest `tbs` is the digest value; without one it is the
    /// raw payload of the pad mode.
    pub(crate) fn sign(&mut self, tbs: &[u8], sig: &mut [u8]) -> Result<usize> {
        let k = self.key.size();
        if sig.len() < k {
            return Err(Error::InvalidSignatureSize {
                size: sig.len(),
                expected: k,
            });
        }

        let Some(md) = self.digest else {
            return self.sign_raw(tbs, sig);
        };
        let md_size = md.output_size();
        if tbs.len() != md_size {
            return Err(Error::InvalidDigestLength {
                expected: md_size,
                actual: tbs.len(),
            });
        }

        match self.pad {
            PadMode::X931 => {
                if k < tbs.len() + 1 {
                    return Err(Error::KeySizeTooSmall {
                        key_size: k,
                        minimum: tbs.len() + 1,
                    });
                }
                let id = md.x931_hash_id().ok_or(Error::InvalidX931Digest)?;
                let mut payload = Zeroizing::new(Vec::with_capacity(tbs.len() + 1));
                payload.extend_from_slice(tbs);
                payload.push(id);
                let mut em = self.scratch.take(k);
                x931_pad(&payload, &mut em)?;
                self.key.x931_private(&em, sig)?;
            }
            PadMode::Pkcs1v15 => {
                let info = Zeroizing::new(digest_info(md, tbs)?);
                let mut em = self.scratch.take(k);
                pkcs1v15_type1_pad(&info, &mut em)?;
                self.key.raw_private(&em, sig)?;
            }
            PadMode::Pss => {
                check_salt_floor(self.salt, md_size, self.min_salt, false)?;
                let bits = self.key.bits();
                let salt_len = resolve_salt_len(self.salt, md_size, k, bits, self.min_salt)?;

                let mut salt = Zeroizing::new(vec![0u8; salt_len]);
                OsRng.fill_bytes(&mut salt);
                let mut hash = md.new_engine()?;
                let mut mgf1 = self.mgf1.unwrap_or(md).new_engine()?;

                self.check_fips_salt(salt_len, md_size, "RSA Sign")?;

                // a modulus of 8n+1 bits leaves a zero leading byte
                let em_bits = bits - 1;
                let offset = k - em_bits.div_ceil(8);
                let mut em = self.scratch.take(k);
                em[..offset].fill(0);
                emsa_pss_encode(tbs, em_bits, &salt, &mut *hash, &mut *mgf1, &mut em[offset..])?;
                self.key.raw_private(&em, sig)?;
            }
            PadMode::None => {
                return Err(Error::InvalidPaddingMode(
                    "Only X.931, PKCS#1 v1.5 or PSS padding allowed".into(),
                ))
            }
        }
        Ok(k)
    }

    fn sign_raw(&mut self, payload: &[u8], sig: &mut [u8]) -> Result<usize> {
        let k = self.key.size();
        match self.pad {
            PadMode::None => {
                if payload.len() != k {
                    return Err(Error::PrimitiveFailure(format!(
                        "raw payload must be {k} bytes, got {}",
                        payload.len()
                    )));
                }
                self.key.raw_private(payload, sig)?;
            }
            PadMode::Pkcs1v15 => {
                let mut em = self.scratch.take(k);
                pkcs1v15_type1_pad(payload, &mut em)?;
                self.key.raw_private(&em, sig)?;
            }
            PadMode::X931 => {
                let mut em = self.scratch.take(k);
                x931_pad(payload, &mut em)?;
                self.key.x931_private(&em, sig)?;
            }
            PadMode::Pss => {
                return Err(Error::InvalidPaddingMode("PSS padding requires a digest".into()))
            }
        }
        Ok(k)
    }

    /// Checks `sig` against `tbs`. Anything wrong with the signature itself
    /// is reported as [`Error::VerificationFailed`].
    pub(crate) fn verify(&mut self, sig: &[u8], tbs: &[u8]) -> Result<()> {
        let k = self.key.size();
        if sig.len() != k {
            return Err(Error::VerificationFailed);
        }
        let Some(md) = self.digest else {
            let mut recovered = Zeroizing::new(vec![0u8; k]);
            let len = self
                .recover_raw(sig, &mut recovered)
                .map_err(|_| Error::VerificationFailed)?;
            return ct_compare(&recovered[..len], tbs);
        };

        match self.pad {
            PadMode::Pkcs1v15 => {
                if tbs.len() != md.output_size() {
                    return Err(Error::VerificationFailed);
                }
                let info = Zeroizing::new(digest_info(md, tbs)?);
                let mut expected = Zeroizing::new(vec![0u8; k]);
                pkcs1v15_type1_pad(&info, &mut expected).map_err(|_| Error::VerificationFailed)?;
                let mut em = self.scratch.take(k);
                self.key
                    .raw_public(sig, &mut em)
                    .map_err(|_| Error::VerificationFailed)?;
                ct_compare(&em, &expected)
            }
            PadMode::X931 => {
                let mut recovered = Zeroizing::new(vec![0u8; k]);
                let len = self
                    .verify_recover(sig, &mut recovered)
                    .map_err(|_| Error::VerificationFailed)?;
                ct_compare(&recovered[..len], tbs)
            }
            PadMode::Pss => {
                let md_size = md.output_size();
                if tbs.len() != md_size {
                    return Err(Error::InvalidDigestLength {
                        expected: md_size,
                        actual: tbs.len(),
                    });
                }
                let bits = self.key.bits();
                let em_bits = bits - 1;
                let offset = k - em_bits.div_ceil(8);
                let s_len = match self.salt {
                    SaltLength::Digest => Some(md_size),
                    SaltLength::Auto | SaltLength::AutoDigestMax => None,
                    SaltLength::Max => Some(
                        (k - offset)
                            .checked_sub(md_size + 2)
                            .ok_or(Error::VerificationFailed)?,
                    ),
                    SaltLength::Fixed(n) => Some(n),
                };
                let mut hash = md.new_engine()?;
                let mut mgf1 = self.mgf1.unwrap_or(md).new_engine()?;

                let salt_len = {
                    let mut em = self.scratch.take(k);
                    self.key
                        .raw_public(sig, &mut em)
                        .map_err(|_| Error::VerificationFailed)?;
                    if em[..offset].iter().any(|&b| b != 0) {
                        return Err(Error::VerificationFailed);
                    }
                    emsa_pss_verify(tbs, &mut em[offset..], em_bits, s_len, &mut *hash, &mut *mgf1)
                        .map_err(|_| Error::VerificationFailed)?
                };
                if self.min_salt.is_some_and(|min| salt_len < min) {
                    return Err(Error::VerificationFailed);
                }
                self.check_fips_salt(salt_len, md_size, "RSA Verify")
            }
            PadMode::None => Err(Error::InvalidPaddingMode(
                "Only X.931, PKCS#1 v1.5 or PSS padding allowed".into(),
            )),
        }
    }

    /// Recovers the signed value from `sig` into `out`, returning its length.
    pub(crate) fn verify_recover(&mut self, sig: &[u8], out: &mut [u8]) -> Result<usize> {
        let k = self.key.size();
        let Some(md) = self.digest else {
            return self.recover_raw(sig, out);
        };
        let md_size = md.output_size();

        let mut em = self.scratch.take(k);
        let digest = match self.pad {
            PadMode::X931 => {
                self.key.x931_public(sig, &mut em)?;
                let payload = x931_unpad(&em)?;
                let (&id, digest) = payload
                    .split_last()
                    .ok_or_else(|| Error::PrimitiveFailure("empty X9.31 payload".into()))?;
                if Some(id) != md.x931_hash_id() {
                    return Err(Error::AlgorithmMismatch);
                }
                if digest.len() != md_size {
                    return Err(Error::InvalidDigestLength {
                        expected: md_size,
                        actual: digest.len(),
                    });
                }
                digest
            }
            PadMode::Pkcs1v15 => {
                check_signature_len(sig, k)?;
                self.key.raw_public(sig, &mut em)?;
                let payload = pkcs1v15_type1_unpad(&em)?;
                let template = digest_info(md, &vec![0u8; md_size])?;
                let prefix_len = template.len() - md_size;
                if payload.len() != template.len() || payload[..prefix_len] != template[..prefix_len] {
                    return Err(Error::PrimitiveFailure("bad DigestInfo".into()));
                }
                &payload[prefix_len..]
            }
            _ => {
                return Err(Error::InvalidPaddingMode(
                    "Only X.931 or PKCS#1 v1.5 padding allowed".into(),
                ))
            }
        };
        copy_out(digest, out)
    }

    fn recover_raw(&mut self, sig: &[u8], out: &mut [u8]) -> Result<usize> {
        let k = self.key.size();
        let mut em = self.scratch.take(k);
        match self.pad {
            PadMode::None => {
                self.key.raw_public(sig, &mut em)?;
                copy_out(&em, out)
            }
            PadMode::Pkcs1v15 => {
                check_signature_len(sig, k)?;
                self.key.raw_public(sig, &mut em)?;
                copy_out(pkcs1v15_type1_unpad(&em)?, out)
            }
            PadMode::X931 => {
                self.key.x931_public(sig, &mut em)?;
                copy_out(x931_unpad(&em)?, out)
            }
            PadMode::Pss => Err(Error::InvalidPaddingMode("PSS padding requires a digest".into())),
        }
    }
}

/// PKCS#1 v1.5 signatures are exactly modulus-sized.
fn check_signature_len(sig: &[u8], k: usize) -> Result<()> {
    if sig.len() == k {
        Ok(())
    } else {
        Err(Error::PrimitiveFailure(format!(
            "signature must be {k} bytes, got {}",
            sig.len()
        )))
    }
}

fn copy_out(value: &[u8], out: &mut [u8]) -> Result<usize> {
    if out.len() < value.len() {
        return Err(Error::OutputBufferTooSmall {
            size: out.len(),
            expected: value.len(),
        });
    }
    out[..value.len()].copy_from_slice(value);
    Ok(value.len())
}

fn ct_compare(a: &[u8], b: &[u8]) -> Result<()> {
    if a.len() == b.len() && bool::from(a.ct_eq(b)) {
        Ok(())
    } else {
        Err(Error::VerificationFailed)
    }
}
