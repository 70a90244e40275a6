//! Property tests for init-data verification.
//!
//! Any payload signed with the right secret verifies; any single-byte
//! change to the hash or to a field value does not.

use proptest::prelude::*;
use tally_engine::signature::{sign_init_data, verify, verify_claims};
use tally_engine::Error;

const SECRET: &[u8] = b"7537643325:test-token";

fn signed(id: i64, username: &str) -> String {
    sign_init_data(&[("id", &id.to_string()), ("username", username)], SECRET)
}

fn split_hash(raw: &str) -> (&str, &str) {
    raw.rsplit_once("&hash=").unwrap()
}

// Mutates a lowercase hex digit into a different one.
fn flip_hex(c: u8) -> u8 {
    if c == b'0' {
        b'1'
    } else {
        b'0'
    }
}

proptest! {
    #[test]
    fn correctly_signed_payloads_verify(id in 1i64..i64::MAX, username in "[a-z][a-z0-9_]{0,31}") {
        let raw = signed(id, &username);
        let verification = verify(&raw, SECRET);

        prop_assert!(verification.valid);
        let claims = verification.claims.unwrap();
        prop_assert_eq!(claims.id, id);
        prop_assert_eq!(claims.username.as_deref(), Some(username.as_str()));
    }

    #[test]
    fn hash_mutation_is_rejected(id in 1i64..1_000_000, position in 0usize..64) {
        let raw = signed(id, "bob");
        let (fields, hash) = split_hash(&raw);

        let mut mutated = hash.as_bytes().to_vec();
        mutated[position] = flip_hex(mutated[position]);
        let tampered = format!("{fields}&hash={}", String::from_utf8(mutated).unwrap());

        prop_assert!(!verify(&tampered, SECRET).valid);
        prop_assert_eq!(verify_claims(&tampered, SECRET), Err(Error::SignatureMismatch));
    }

    #[test]
    fn field_value_mutation_is_rejected(username in "[a-z]{4,16}", position in 0usize..4) {
        let raw = signed(7, &username);
        let (_, hash) = split_hash(&raw);

        let mut mutated = username.clone().into_bytes();
        mutated[position] = if mutated[position] == b'z' { b'a' } else { mutated[position] + 1 };
        let tampered = format!(
            "id=7&username={}&hash={hash}",
            String::from_utf8(mutated).unwrap()
        );

        prop_assert!(!verify(&tampered, SECRET).valid);
    }

    #[test]
    fn id_mutation_is_rejected(id in 1i64..1_000_000) {
        let raw = signed(id, "bob");
        let (_, hash) = split_hash(&raw);
        let tampered = format!("id={}&username=bob&hash={hash}", id + 1);

        prop_assert!(!verify(&tampered, SECRET).valid);
    }
}

#[test]
fn field_order_does_not_matter() {
    let raw = signed(7, "bob");
    let (_, hash) = split_hash(&raw);
    let reordered = format!("username=bob&hash={hash}&id=7");

    assert!(verify(&reordered, SECRET).valid);
}

#[test]
fn percent_encoded_values_are_decoded_before_hashing() {
    let raw = sign_init_data(&[("id", "7"), ("username", "bob smith&co")], SECRET);
    assert!(raw.contains("bob+smith%26co"));

    let claims = verify_claims(&raw, SECRET).unwrap();
    assert_eq!(claims.username.as_deref(), Some("bob smith&co"));
}

#[test]
fn uppercase_hash_is_rejected() {
    let raw = signed(7, "bob");
    let (fields, hash) = split_hash(&raw);
    let shouted = format!("{fields}&hash={}", hash.to_uppercase());

    assert!(!verify(&shouted, SECRET).valid);
}
