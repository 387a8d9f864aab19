mod common;

use common::{key, public_key, ABC_SHA256};
use hex_literal::hex;
use rsa_sig_provider::{
    Error, Operation, PadMode, ParamKey, ParamValue, Provider, SaltLength, SignatureContext,
    SignatureParams, State,
};

const PKCS1_2048: &[u8] = include_bytes!("data/rsa2048_sha256_pkcs1_abc.sig");

fn sha256() -> SignatureParams {
    SignatureParams::new().digest("SHA2-256")
}

fn signing_context(params: &SignatureParams) -> SignatureContext {
    let mut ctx = Provider::default().new_context(None);
    ctx.sign_init(Some(key(2048)), params).unwrap();
    ctx
}

#[test]
fn set_params_before_init() {
    let mut ctx = Provider::default().new_context(None);
    assert!(matches!(ctx.set_params(&sha256()), Err(Error::NoKeySet)));
}

#[test]
fn init_needs_a_key_once() {
    let mut ctx = Provider::default().new_context(None);
    assert!(matches!(
        ctx.sign_init(None, &sha256()),
        Err(Error::NoKeySet)
    ));
    assert_eq!(ctx.state(), State::Fresh);

    ctx.sign_init(Some(key(2048)), &sha256()).unwrap();
    ctx.sign_init(None, &sha256()).unwrap();
    assert_eq!(ctx.state(), State::Initialized);
    assert_eq!(ctx.operation(), Some(Operation::Sign));
}

#[test]
fn oneshot_runs_once_per_init() {
    let mut ctx = signing_context(&sha256());
    let mut sig = [0u8; 256];
    ctx.sign(Some(&mut sig[..]), &ABC_SHA256).unwrap();
    assert_eq!(ctx.state(), State::Finalized);
    assert!(matches!(
        ctx.sign(Some(&mut sig[..]), &ABC_SHA256),
        Err(Error::OneshotOutOfOrder)
    ));

    ctx.sign_init(None, &SignatureParams::new()).unwrap();
    ctx.sign(Some(&mut sig[..]), &ABC_SHA256).unwrap();
    assert_eq!(&sig[..], PKCS1_2048);
}

#[test]
fn short_signature_buffer_leaves_state_alone() {
    let mut ctx = signing_context(&sha256());
    assert_eq!(ctx.sign(None, &ABC_SHA256).unwrap(), 256);

    let mut short = [0u8; 255];
    assert!(matches!(
        ctx.sign(Some(&mut short[..]), &ABC_SHA256),
        Err(Error::InvalidSignatureSize { size: 255, expected: 256 })
    ));
    assert_eq!(ctx.state(), State::Initialized);

    let mut sig = [0u8; 256];
    assert_eq!(ctx.sign(Some(&mut sig[..]), &ABC_SHA256).unwrap(), 256);
}

#[test]
fn streaming_order() {
    let mut ctx = Provider::default().new_context(None);
    assert!(matches!(
        ctx.digest_sign_update(b"abc"),
        Err(Error::UpdateOutOfOrder)
    ));

    ctx.digest_sign_init(Some("SHA2-256"), Some(key(2048)), &SignatureParams::new())
        .unwrap();
    assert_eq!(ctx.digest_sign_final(None).unwrap(), 256);
    assert_eq!(ctx.state(), State::Initialized);

    ctx.digest_sign_update(b"ab").unwrap();
    assert_eq!(ctx.state(), State::Accumulating);
    let mut sig = [0u8; 256];
    assert!(matches!(
        ctx.sign(Some(&mut sig[..]), b"c"),
        Err(Error::OneshotOutOfOrder)
    ));

    ctx.digest_sign_update(b"c").unwrap();
    assert_eq!(ctx.digest_sign_final(Some(&mut sig[..])).unwrap(), 256);
    assert_eq!(&sig[..], PKCS1_2048);
    assert_eq!(ctx.state(), State::Finalized);

    assert!(matches!(
        ctx.digest_sign_final(Some(&mut sig[..])),
        Err(Error::FinalOutOfOrder)
    ));
    assert!(matches!(
        ctx.digest_sign_update(b"abc"),
        Err(Error::UpdateOutOfOrder)
    ));
}

#[test]
fn oneshot_message_signing() {
    let mut ctx = Provider::default().new_context(None);
    ctx.digest_sign_init(Some("SHA2-256"), Some(key(2048)), &SignatureParams::new())
        .unwrap();
    assert_eq!(ctx.operation(), Some(Operation::SignMessage));

    let mut sig = [0u8; 256];
    ctx.sign(Some(&mut sig[..]), b"abc").unwrap();
    assert_eq!(&sig[..], PKCS1_2048);
}

#[test]
fn primitive_context_has_no_running_digest() {
    let mut ctx = signing_context(&sha256());
    assert!(matches!(
        ctx.digest_sign_update(b"abc"),
        Err(Error::UnsupportedOperation(_))
    ));
}

#[test]
fn operation_mismatch() {
    let mut ctx = Provider::default().new_context(None);
    ctx.verify_init(Some(public_key(2048)), &sha256()).unwrap();
    let mut sig = [0u8; 256];
    assert!(matches!(
        ctx.sign(Some(&mut sig[..]), &ABC_SHA256),
        Err(Error::UnsupportedOperation(_))
    ));
    assert!(matches!(
        ctx.verify_recover(PKCS1_2048, None),
        Err(Error::UnsupportedOperation(_))
    ));
}

#[test]
fn signing_needs_private_key() {
    let mut ctx = Provider::default().new_context(None);
    ctx.sign_init(Some(public_key(2048)), &sha256()).unwrap();
    let mut sig = [0u8; 256];
    assert!(matches!(
        ctx.sign(Some(&mut sig[..]), &ABC_SHA256),
        Err(Error::InvalidKey(_))
    ));
}

#[test]
fn failed_init_leaves_context_fresh() {
    let mut ctx = Provider::default().new_context(None);
    assert!(matches!(
        ctx.sign_init(Some(key(2048)), &SignatureParams::new().pad_mode_name("oaep")),
        Err(Error::InvalidPaddingMode(_))
    ));
    assert_eq!(ctx.state(), State::Fresh);
    assert!(matches!(
        ctx.sign(None, &ABC_SHA256),
        Err(Error::OneshotOutOfOrder)
    ));

    assert!(matches!(
        ctx.sign_init(Some(key(2048)), &SignatureParams::new().pad_mode_legacy(4)),
        Err(Error::InvalidPaddingMode(_))
    ));
}

#[test]
fn set_params_is_transactional() {
    let mut ctx = signing_context(&sha256());
    assert!(matches!(
        ctx.set_params(&SignatureParams::new().pad_mode(PadMode::Pss).digest("KECCAK-256")),
        Err(Error::DigestNotAllowed(_))
    ));
    assert_eq!(ctx.pad_mode(), PadMode::Pkcs1v15);
    assert_eq!(
        ctx.get_param(ParamKey::Digest).unwrap(),
        ParamValue::Utf8("SHA2-256".into())
    );
}

#[test]
fn digest_resolution_errors() {
    let mut ctx = signing_context(&SignatureParams::new());
    assert!(matches!(
        ctx.set_params(&SignatureParams::new().digest("SHAKE-256")),
        Err(Error::XofNotAllowed)
    ));
    assert!(matches!(
        ctx.set_params(&SignatureParams::new().digest("WHIRLPOOL")),
        Err(Error::InvalidDigest(_))
    ));
    assert!(matches!(
        ctx.set_params(&SignatureParams::new().digest("x".repeat(64))),
        Err(Error::InvalidDigest(_))
    ));
    assert_eq!(ctx.digest(), None);
}

#[test]
fn salt_length_and_mgf1_need_pss() {
    let mut ctx = signing_context(&sha256());
    assert!(matches!(
        ctx.set_params(&SignatureParams::new().salt_length(SaltLength::Digest)),
        Err(Error::UnsupportedOperation(_))
    ));
    assert!(matches!(
        ctx.set_params(&SignatureParams::new().mgf1_digest("SHA1")),
        Err(Error::InvalidMgf1Digest)
    ));

    ctx.set_params(
        &SignatureParams::new()
            .pad_mode_name("pss")
            .salt_length_name("max")
            .mgf1_digest("SHA1"),
    )
    .unwrap();
    assert_eq!(ctx.pad_mode(), PadMode::Pss);
    assert_eq!(ctx.salt_length(), SaltLength::Max);
    assert_eq!(
        ctx.get_param(ParamKey::Mgf1Digest).unwrap(),
        ParamValue::Utf8("SHA1".into())
    );
}

#[test]
fn no_padding_refuses_a_digest() {
    let mut ctx = signing_context(&sha256());
    assert!(matches!(
        ctx.set_params(&SignatureParams::new().pad_mode(PadMode::None)),
        Err(Error::InvalidPaddingMode(_))
    ));
}

#[test]
fn x931_refuses_digest_without_trailer_id() {
    let mut ctx = signing_context(&SignatureParams::new().digest("SHA2-224"));
    assert!(matches!(
        ctx.set_params(&SignatureParams::new().pad_mode(PadMode::X931)),
        Err(Error::InvalidX931Digest)
    ));
}

#[test]
fn pss_only_for_sign_and_verify() {
    let mut ctx = Provider::default().new_context(None);
    assert!(matches!(
        ctx.verify_recover_init(Some(public_key(2048)), &SignatureParams::new().pad_mode(PadMode::Pss)),
        Err(Error::InvalidPaddingMode(_))
    ));
}

#[test]
fn pss_without_digest_defaults_to_sha1() {
    let ctx = signing_context(&SignatureParams::new().pad_mode(PadMode::Pss));
    assert_eq!(
        ctx.get_param(ParamKey::Digest).unwrap(),
        ParamValue::Utf8("SHA1".into())
    );
    assert_eq!(
        ctx.get_param(ParamKey::Mgf1Digest).unwrap(),
        ParamValue::Utf8("SHA1".into())
    );
    assert_eq!(
        ctx.get_param(ParamKey::SaltLength).unwrap(),
        ParamValue::SaltLength(SaltLength::AutoDigestMax)
    );
}

#[test]
fn unbound_digest_reads_empty() {
    let ctx = signing_context(&SignatureParams::new());
    assert_eq!(
        ctx.get_param(ParamKey::Digest).unwrap(),
        ParamValue::Utf8(String::new())
    );
    assert_eq!(
        ctx.get_param(ParamKey::PadMode).unwrap(),
        ParamValue::PadMode(PadMode::Pkcs1v15)
    );
    assert!(matches!(
        ctx.get_param(ParamKey::Signature),
        Err(Error::UnsupportedOperation(_))
    ));
    assert!(matches!(
        ctx.get_param(ParamKey::FipsVerifyMessage),
        Err(Error::UnsupportedOperation(_))
    ));
    assert!(!ctx.gettable_params().contains(&ParamKey::FipsVerifyMessage));
}

#[test]
fn pkcs1_algorithm_identifiers() {
    let ctx = signing_context(&sha256());
    assert_eq!(
        ctx.get_param(ParamKey::AlgorithmId).unwrap(),
        ParamValue::Octets(hex!("300d06092a864886f70d01010b0500").to_vec())
    );

    let ctx = signing_context(&SignatureParams::new().digest("SHA1"));
    assert_eq!(
        ctx.algorithm_id().unwrap(),
        hex!("300d06092a864886f70d0101050500")
    );
}

#[test]
fn pss_algorithm_identifier_resolves_salt() {
    let ctx = signing_context(
        &SignatureParams::new()
            .pad_mode(PadMode::Pss)
            .digest("SHA2-512")
            .salt_length_legacy(SaltLength::MAX),
    );
    assert_eq!(
        ctx.algorithm_id().unwrap(),
        hex!(
            "304206092a864886f70d01010a3035a00f300d06096086480165030402030500"
            "a11c301a06092a864886f70d010108300d06096086480165030402030500"
            "a204020200be"
        )
    );
}

#[test]
fn x931_has_no_algorithm_identifier() {
    let ctx = signing_context(&SignatureParams::new().pad_mode(PadMode::X931).digest("SHA1"));
    assert!(matches!(
        ctx.get_param(ParamKey::AlgorithmId),
        Err(Error::UnsupportedOperation(_))
    ));
}

#[test]
fn digest_is_locked_while_streaming() {
    let mut ctx = Provider::default().new_context(None);
    ctx.digest_sign_init(Some("SHA2-256"), Some(key(2048)), &SignatureParams::new())
        .unwrap();
    assert!(!ctx.digest_change_allowed());
    assert!(!ctx.settable_params().contains(&ParamKey::Digest));
    assert!(matches!(
        ctx.set_params(&SignatureParams::new().digest("SHA2-384")),
        Err(Error::DigestNotAllowed(_))
    ));
    ctx.set_params(&SignatureParams::new().digest("sha256")).unwrap();

    ctx.digest_sign_update(b"abc").unwrap();
    let mut sig = [0u8; 256];
    ctx.digest_sign_final(Some(&mut sig[..])).unwrap();

    assert!(ctx.digest_change_allowed());
    assert!(ctx.settable_params().contains(&ParamKey::Digest));
    ctx.set_params(&SignatureParams::new().digest("SHA2-384")).unwrap();
}

#[test]
fn init_unlocks_abandoned_digest_operation() {
    let mut ctx = Provider::default().new_context(None);
    ctx.digest_sign_init(Some("SHA2-256"), Some(key(2048)), &SignatureParams::new())
        .unwrap();
    ctx.digest_sign_update(b"ab").unwrap();

    ctx.sign_init(None, &SignatureParams::new().digest("SHA2-384"))
        .unwrap();
    assert!(ctx.digest_change_allowed());
    assert_eq!(ctx.digest(), Some(rsa_sig_provider::DigestAlgorithm::Sha384));
}

#[test]
fn signature_is_staged_only_for_verify_message() {
    let mut ctx = signing_context(&sha256());
    assert!(!ctx.settable_params().contains(&ParamKey::Signature));
    assert!(matches!(
        ctx.set_params(&SignatureParams::new().signature(PKCS1_2048)),
        Err(Error::UnsupportedOperation(_))
    ));

    let mut ctx = Provider::default().new_context(None);
    ctx.digest_verify_init(Some("SHA2-256"), Some(public_key(2048)), &SignatureParams::new())
        .unwrap();
    assert!(ctx.settable_params().contains(&ParamKey::Signature));
    ctx.set_params(&SignatureParams::new().signature(PKCS1_2048))
        .unwrap();
}

#[test]
fn dup_keeps_running_digest() {
    let mut ctx = Provider::default().new_context(None);
    ctx.digest_sign_init(Some("SHA2-256"), Some(key(2048)), &SignatureParams::new())
        .unwrap();
    ctx.digest_sign_update(b"ab").unwrap();

    let mut copy = ctx.dup();
    assert_eq!(copy.state(), State::Accumulating);

    let mut sig = [0u8; 256];
    let mut copy_sig = [0u8; 256];
    ctx.digest_sign_update(b"c").unwrap();
    copy.digest_sign_update(b"c").unwrap();
    ctx.digest_sign_final(Some(&mut sig[..])).unwrap();
    copy.digest_sign_final(Some(&mut copy_sig[..])).unwrap();

    assert_eq!(sig, copy_sig);
    assert_eq!(&sig[..], PKCS1_2048);
}

#[test]
fn raw_payloads_without_digest() {
    let provider = Provider::default();
    let payload = b"raw payload without DigestInfo";

    let mut ctx = provider.new_context(None);
    ctx.sign_init(Some(key(2048)), &SignatureParams::new()).unwrap();
    let mut sig = [0u8; 256];
    ctx.sign(Some(&mut sig[..]), payload).unwrap();

    let mut ctx = provider.new_context(None);
    ctx.verify_recover_init(Some(public_key(2048)), &SignatureParams::new())
        .unwrap();
    let mut out = [0u8; 256];
    let len = ctx.verify_recover(&sig, Some(&mut out[..])).unwrap();
    assert_eq!(&out[..len], payload);

    let mut ctx = provider.new_context(None);
    ctx.verify_init(Some(public_key(2048)), &SignatureParams::new()).unwrap();
    ctx.verify(&sig, payload).unwrap();
}

#[test]
fn raw_rsa_without_padding() {
    let provider = Provider::default();
    let none = SignatureParams::new().pad_mode(PadMode::None);
    let mut block = [0x5Au8; 256];
    block[0] = 0;

    let mut ctx = provider.new_context(None);
    ctx.sign_init(Some(key(2048)), &none).unwrap();
    let mut sig = [0u8; 256];
    assert!(matches!(
        ctx.sign(Some(&mut sig[..]), &block[..255]),
        Err(Error::PrimitiveFailure(_))
    ));

    ctx.sign_init(None, &none).unwrap();
    ctx.sign(Some(&mut sig[..]), &block).unwrap();

    let mut ctx = provider.new_context(None);
    ctx.verify_recover_init(Some(public_key(2048)), &none).unwrap();
    let mut out = [0u8; 256];
    assert_eq!(ctx.verify_recover(&sig, Some(&mut out[..])).unwrap(), 256);
    assert_eq!(out, block);
}

#[test]
fn pss_signatures_are_randomized() {
    let provider = Provider::default();
    let params = SignatureParams::new()
        .pad_mode(PadMode::Pss)
        .digest("SHA2-256")
        .salt_length(SaltLength::Digest);

    let mut sigs = Vec::new();
    for _ in 0..2 {
        let mut ctx = provider.new_context(None);
        ctx.sign_init(Some(key(3072)), &params).unwrap();
        let mut sig = vec![0u8; 384];
        ctx.sign(Some(&mut sig[..]), &ABC_SHA256).unwrap();
        sigs.push(sig);
    }
    assert_ne!(sigs[0], sigs[1]);

    for sig in &sigs {
        let mut ctx = provider.new_context(None);
        ctx.verify_init(Some(public_key(3072)), &params).unwrap();
        ctx.verify(sig, &ABC_SHA256).unwrap();
    }
}

#[test]
fn primitive_init_drops_running_digest() {
    let mut ctx = Provider::default().new_context(None);
    ctx.digest_sign_init(Some("SHA2-256"), Some(key(2048)), &SignatureParams::new())
        .unwrap();
    ctx.digest_sign_update(b"ab").unwrap();

    ctx.sign_init(None, &SignatureParams::new()).unwrap();
    assert!(matches!(
        ctx.digest_sign_update(b"c"),
        Err(Error::UnsupportedOperation(_))
    ));
    assert_eq!(ctx.state(), State::Initialized);

    let mut sig = [0u8; 256];
    ctx.sign(Some(&mut sig[..]), &ABC_SHA256).unwrap();
    assert_eq!(&sig[..], PKCS1_2048);
}

#[test]
fn signature_without_leading_zero_is_rejected() {
    let mut signer = signing_context(&sha256());
    let (sig, digest) = (0u32..20_000)
        .find_map(|counter| {
            let digest = rsa_sig_provider::DigestAlgorithm::Sha256
                .digest(&counter.to_be_bytes())
                .unwrap();
            let mut sig = [0u8; 256];
            signer.sign_init(None, &sha256()).unwrap();
            signer.sign(Some(&mut sig[..]), &digest).unwrap();
            (sig[0] == 0).then_some((sig, digest))
        })
        .expect("no signature with a leading zero byte");

    let provider = Provider::default();
    let mut ctx = provider.new_context(None);
    ctx.verify_init(Some(public_key(2048)), &sha256()).unwrap();
    ctx.verify(&sig, &digest).unwrap();

    ctx.verify_init(None, &sha256()).unwrap();
    assert!(matches!(
        ctx.verify(&sig[1..], &digest),
        Err(Error::VerificationFailed)
    ));

    let mut ctx = provider.new_context(None);
    ctx.verify_recover_init(Some(public_key(2048)), &sha256()).unwrap();
    let mut out = [0u8; 32];
    assert_eq!(ctx.verify_recover(&sig, Some(&mut out[..])).unwrap(), 32);
    assert_eq!(&out[..], &digest[..]);
    assert!(ctx.verify_recover(&sig[1..], Some(&mut out[..])).is_err());
}
