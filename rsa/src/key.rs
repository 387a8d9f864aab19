//! RSA key handle shared by signature contexts.

use crate::{DigestAlgorithm, Error, Result};
use rand_core::OsRng;
use rsa::{
    hazmat::{rsa_decrypt_and_check, rsa_encrypt},
    traits::PublicKeyParts,
    BigUint, RsaPrivateKey, RsaPublicKey,
};
use zeroize::Zeroizing;

/// Key type tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyType {
    /// Plain `rsaEncryption` key, usable with any signature padding.
    Rsa,
    /// `id-RSASSA-PSS` key, usable with PSS padding only.
    RsaPss,
}

/// Parameter restrictions embedded in an RSA-PSS key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PssRestrictions {
    /// Hash that must be used for the message digest.
    pub digest: DigestAlgorithm,
    /// Hash that must be used by MGF1.
    pub mgf1_digest: DigestAlgorithm,
    /// Smallest salt length signatures may use.
    pub min_salt_len: usize,
}

/// An RSA key as seen by signature contexts.
///
/// The key is immutable once built and is shared between contexts through an
/// `Arc`.
#[derive(Clone, Debug)]
pub struct RsaKey {
    public: RsaPublicKey,
    private: Option<RsaPrivateKey>,
    key_type: KeyType,
    pss: Option<PssRestrictions>,
}

impl RsaKey {
    /// Plain RSA key with a private half.
    pub fn from_private_key(key: RsaPrivateKey) -> Self {
        Self {
            public: key.to_public_key(),
            private: Some(key),
            key_type: KeyType::Rsa,
            pss: None,
        }
    }

    /// Plain RSA key for verification only.
    pub fn from_public_key(key: RsaPublicKey) -> Self {
        Self {
            public: key,
            private: None,
            key_type: KeyType::Rsa,
            pss: None,
        }
    }

    /// Retags the key as an RSA-PSS key, optionally restricted.
    pub fn into_pss(mut self, restrictions: Option<PssRestrictions>) -> Self {
        self.key_type = KeyType::RsaPss;
        self.pss = restrictions;
        self
    }

    /// Key type tag.
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Restrictions of an RSA-PSS key, if any.
    pub fn pss_restrictions(&self) -> Option<&PssRestrictions> {
        self.pss.as_ref()
    }

    /// Modulus size in bytes.
    pub fn size(&self) -> usize {
        self.public.size()
    }

    /// Modulus length in bits.
    pub fn bits(&self) -> usize {
        self.public.n().bits()
    }

    /// Whether the private half is present.
    pub fn has_private(&self) -> bool {
        self.private.is_some()
    }

    /// Public half.
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    fn private(&self) -> Result<&RsaPrivateKey> {
        self.private
            .as_ref()
            .ok_or_else(|| Error::InvalidKey("private key required".into()))
    }

    fn to_int(&self, input: &[u8]) -> Result<Zeroizing<BigUint>> {
        if input.len() > self.size() {
            return Err(Error::PrimitiveFailure("data too large for modulus".into()));
        }
        let m = Zeroizing::new(BigUint::from_bytes_be(input));
        if *m >= *self.public.n() {
            return Err(Error::PrimitiveFailure("data too large for modulus".into()));
        }
        Ok(m)
    }

    fn write_int(&self, value: &BigUint, out: &mut [u8]) -> Result<()> {
        let bytes = Zeroizing::new(value.to_bytes_be());
        let k = self.size();
        if out.len() < k || bytes.len() > k {
            return Err(Error::InternalError);
        }
        let (pad, tail) = out[..k].split_at_mut(k - bytes.len());
        pad.fill(0);
        tail.copy_from_slice(&bytes);
        Ok(())
    }

    /// `out[..k] = input^d mod n`, with blinding.
    pub(crate) fn raw_private(&self, input: &[u8], out: &mut [u8]) -> Result<()> {
        let m = self.to_int(input)?;
        let s = Zeroizing::new(rsa_decrypt_and_check(self.private()?, Some(&mut OsRng), &m)?);
        self.write_int(&s, out)
    }

    /// `out[..k] = input^e mod n`.
    pub(crate) fn raw_public(&self, input: &[u8], out: &mut [u8]) -> Result<()> {
        let c = self.to_int(input)?;
        let m = Zeroizing::new(rsa_encrypt(&self.public, &c)?);
        self.write_int(&m, out)
    }

    /// X9.31 private transform: the smaller of `s` and `n - s`.
    pub(crate) fn x931_private(&self, input: &[u8], out: &mut [u8]) -> Result<()> {
        let m = self.to_int(input)?;
        let s = Zeroizing::new(rsa_decrypt_and_check(self.private()?, Some(&mut OsRng), &m)?);
        let alt = Zeroizing::new(self.public.n() - &*s);
        self.write_int(if *alt < *s { &alt } else { &s }, out)
    }

    /// X9.31 public transform. Representatives whose low nibble is not
    /// `0xC` are mapped back through `n - m`.
    pub(crate) fn x931_public(&self, input: &[u8], out: &mut [u8]) -> Result<()> {
        self.raw_public(input, out)?;
        let k = self.size();
        if out[k - 1] & 0x0F != 0x0C {
            let m = Zeroizing::new(BigUint::from_bytes_be(&out[..k]));
            let alt = Zeroizing::new(self.public.n() - &*m);
            self.write_int(&alt, out)?;
        }
        Ok(())
    }
}

impl From<RsaPrivateKey> for RsaKey {
    fn from(key: RsaPrivateKey) -> Self {
        Self::from_private_key(key)
    }
}

impl From<RsaPublicKey> for RsaKey {
    fn from(key: RsaPublicKey) -> Self {
        Self::from_public_key(key)
    }
}
