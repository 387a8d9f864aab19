//! [`signature`] trait adapters over the fixed sigalgs.

use crate::{
    config::Provider, key::RsaKey, params::SignatureParams, sigalg::SigalgContext, Error,
    Result, Signature,
};
use signature::{Keypair, Signer, Verifier};
use std::sync::Arc;

/// Signs whole messages with one sigalg, e.g. `RSA-SHA2-256`.
#[derive(Clone, Debug)]
pub struct SigalgSigningKey {
    template: SigalgContext,
    key: Arc<RsaKey>,
}

impl SigalgSigningKey {
    /// Binds `key` to the sigalg `name` of `provider`.
    pub fn new(provider: &Provider, name: &str, key: Arc<RsaKey>) -> Result<Self> {
        if !key.has_private() {
            return Err(Error::InvalidKey("signing requires a private key".into()));
        }
        Ok(Self {
            template: provider.new_sigalg_context(name, None)?,
            key,
        })
    }

    /// Key used for signing.
    pub fn key(&self) -> &Arc<RsaKey> {
        &self.key
    }
}

impl Signer<Signature> for SigalgSigningKey {
    fn try_sign(&self, msg: &[u8]) -> signature::Result<Signature> {
        let mut ctx = self.template.dup();
        ctx.sign_message_init(Some(Arc::clone(&self.key)), &SignatureParams::new())?;

        let mut sig = vec![0u8; self.key.size()];
        let len = ctx.sign(Some(&mut sig[..]), msg)?;
        sig.truncate(len);
        Ok(sig.into())
    }
}

impl Keypair for SigalgSigningKey {
    type VerifyingKey = SigalgVerifyingKey;

    fn verifying_key(&self) -> Self::VerifyingKey {
        SigalgVerifyingKey {
            template: self.template.clone(),
            key: Arc::new(RsaKey::from_public_key(self.key.public_key().clone())),
        }
    }
}

/// Verifies whole-message signatures made with one sigalg.
#[derive(Clone, Debug)]
pub struct SigalgVerifyingKey {
    template: SigalgContext,
    key: Arc<RsaKey>,
}

impl SigalgVerifyingKey {
    /// Binds `key` to the sigalg `name` of `provider`.
    pub fn new(provider: &Provider, name: &str, key: Arc<RsaKey>) -> Result<Self> {
        Ok(Self {
            template: provider.new_sigalg_context(name, None)?,
            key,
        })
    }

    /// Key used for verification.
    pub fn key(&self) -> &Arc<RsaKey> {
        &self.key
    }
}

impl Verifier<Signature> for SigalgVerifyingKey {
    fn verify(&self, msg: &[u8], signature: &Signature) -> signature::Result<()> {
        let mut ctx = self.template.dup();
        ctx.verify_message_init(Some(Arc::clone(&self.key)), &SignatureParams::new())?;
        ctx.verify(signature.as_bytes(), msg)?;
        Ok(())
    }
}
