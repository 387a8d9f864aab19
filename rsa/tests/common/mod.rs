#![allow(dead_code)]

use hex_literal::hex;
use rsa_sig_provider::{
    rsa::{pkcs1::DecodeRsaPrivateKey, RsaPrivateKey},
    PssRestrictions, RsaKey,
};
use std::sync::Arc;

/// SHA-256 of `"abc"`.
pub const ABC_SHA256: [u8; 32] =
    hex!("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");

/// SHA-256 of `"abd"`.
pub fn abd_sha256() -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(
        &rsa_sig_provider::DigestAlgorithm::Sha256
            .digest(b"abd")
            .expect("SHA-256 is always available"),
    );
    out
}

fn pem(bits: usize) -> &'static str {
    match bits {
        1024 => include_str!("../pems/rsa1024.pem"),
        1025 => include_str!("../pems/rsa1025.pem"),
        2048 => include_str!("../pems/rsa2048.pem"),
        3072 => include_str!("../pems/rsa3072.pem"),
        other => panic!("no {other}-bit test key"),
    }
}

pub fn private_key(bits: usize) -> RsaPrivateKey {
    RsaPrivateKey::from_pkcs1_pem(pem(bits)).expect("Failed to decode PEM encoded OpenSSL key")
}

/// Plain RSA key with its private half.
pub fn key(bits: usize) -> Arc<RsaKey> {
    Arc::new(RsaKey::from(private_key(bits)))
}

/// Plain RSA key without its private half.
pub fn public_key(bits: usize) -> Arc<RsaKey> {
    Arc::new(RsaKey::from(private_key(bits).to_public_key()))
}

/// RSA-PSS typed key, optionally restricted.
pub fn pss_key(bits: usize, restrictions: Option<PssRestrictions>) -> Arc<RsaKey> {
    Arc::new(RsaKey::from(private_key(bits)).into_pss(restrictions))
}
