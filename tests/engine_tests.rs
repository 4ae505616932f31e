//! Encryption and decryption integration tests.

use spotcrypt::{
    decrypt, decrypt_base64, encrypt, encrypt_to_base64, encrypted_for, encrypted_for_base64,
    generate_key_pair, Error, PrivateMaterial, PublicMaterial, ENVELOPE_MARKER,
};

fn pair(label: &str) -> (PrivateMaterial, PublicMaterial) {
    generate_key_pair(label).unwrap()
}

#[test]
fn test_encrypt_decrypt_round_trip() {
    let (private, public) = pair("alice");

    let envelope = encrypt("Hello, world!", &[&public]).unwrap();
    let opened = decrypt(&envelope, &[&private]).unwrap();

    assert_eq!(opened.plaintext, "Hello, world!");
    assert_eq!(opened.key_label, "alice");
}

#[test]
fn test_each_recipient_can_decrypt_alone() {
    let (alice_private, alice_public) = pair("alice");
    let (bob_private, bob_public) = pair("bob");

    let envelope = encrypt("Group message", &[&alice_public, &bob_public]).unwrap();

    let opened = decrypt(&envelope, &[&alice_private]).unwrap();
    assert_eq!(opened.plaintext, "Group message");
    assert_eq!(opened.key_label, "alice");

    let opened = decrypt(&envelope, &[&bob_private]).unwrap();
    assert_eq!(opened.plaintext, "Group message");
    assert_eq!(opened.key_label, "bob");
}

#[test]
fn test_first_matching_candidate_wins() {
    let (alice_private, alice_public) = pair("alice");
    let (bob_private, bob_public) = pair("bob");
    let (carol_private, _) = pair("carol");

    let envelope = encrypt("x", &[&alice_public, &bob_public]).unwrap();

    // Carol cannot open it, so the scan moves on to Bob.
    let opened = decrypt(&envelope, &[&carol_private, &bob_private, &alice_private]).unwrap();
    assert_eq!(opened.key_label, "bob");
}

#[test]
fn test_wrong_key_cannot_decrypt() {
    let (_, alice_public) = pair("alice");
    let (carol_private, _) = pair("carol");

    let envelope = encrypt("for alice only", &[&alice_public]).unwrap();

    let result = decrypt(&envelope, &[&carol_private]);
    assert!(matches!(result, Err(Error::NoMatchingKey)));
}

#[test]
fn test_no_candidates() {
    let (_, public) = pair("alice");
    let envelope = encrypt("x", &[&public]).unwrap();

    let result = decrypt(&envelope, &[]);
    assert!(matches!(result, Err(Error::NoMatchingKey)));
}

#[test]
fn test_no_recipients() {
    let result = encrypt("x", &[]);
    assert!(matches!(result, Err(Error::Encryption(_))));
}

#[test]
fn test_encrypted_for_lists_every_recipient() {
    let (_, alice_public) = pair("alice");
    let (_, bob_public) = pair("bob");

    let envelope = encrypt("x", &[&alice_public, &bob_public]).unwrap();
    let recipients = encrypted_for(&envelope).unwrap();

    assert_eq!(recipients.len(), 2);
    assert!(recipients.contains(&alice_public.encryption_key_ids()[0]));
    assert!(recipients.contains(&bob_public.encryption_key_ids()[0]));
}

#[test]
fn test_base64_form_starts_with_marker() {
    let (private, public) = pair("alice");

    let ciphertext = encrypt_to_base64("marked", &[&public]).unwrap();
    assert!(ciphertext.starts_with(ENVELOPE_MARKER));

    let opened = decrypt_base64(&ciphertext, &[&private]).unwrap();
    assert_eq!(opened.plaintext, "marked");

    let recipients = encrypted_for_base64(&ciphertext).unwrap();
    assert_eq!(recipients, public.encryption_key_ids());
}

#[test]
fn test_malformed_base64_is_a_parse_error() {
    let (private, _) = pair("alice");

    let result = decrypt_base64("@@not base64@@", &[&private]);
    assert!(matches!(result, Err(Error::Parse(_))));
}

#[test]
fn test_garbage_bytes_do_not_decrypt() {
    let (private, _) = pair("alice");

    let result = decrypt(b"definitely not an envelope", &[&private]);
    assert!(result.is_err());
}

#[test]
fn test_utf8_plaintext_round_trip() {
    let (private, public) = pair("unicode");

    let message = "héllo wörld \u{1F512} grüße";
    let ciphertext = encrypt_to_base64(message, &[&public]).unwrap();
    let opened = decrypt_base64(&ciphertext, &[&private]).unwrap();

    assert_eq!(opened.plaintext, message);
}
