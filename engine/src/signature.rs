//! Web app init-data verification.
//!
//! The front-end platform hands the client a query string (`init data`)
//! signed with a key derived from the bot token. Verification:
//!
//! 1. Parse `key=value` pairs (URL-decoded); reject malformed input
//! 2. Remove the `hash` field
//! 3. Sort the remaining pairs by key and join them as `key=value` lines
//! 4. Derive the secret key as `HMAC-SHA256(key = "WebAppData", msg = token)`
//! 5. Expect `hex(HMAC-SHA256(key = secret key, msg = check string))`
//! 6. Compare in constant time
//!
//! The user identity comes from the `user` field (URL-encoded JSON) when it
//! is present, otherwise from the flat `id` / `username` fields.

use crate::error::{Error, Result};
use crate::record::{UserSession, UNKNOWN_DISPLAY_NAME};
use crate::UserId;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use subtle::ConstantTimeEq;
use url::form_urlencoded;

type HmacSha256 = Hmac<Sha256>;

/// Key used to derive the secret key from the bot token.
pub const SECRET_KEY_LABEL: &[u8] = b"WebAppData";

const HASH_FIELD: &str = "hash";
const USER_FIELD: &str = "user";

/// Identity claims carried by verified init data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
}

impl UserClaims {
    /// Username, then first name, then `"Unknown"`.
    pub fn display_name(&self) -> &str {
        [&self.username, &self.first_name]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_DISPLAY_NAME)
    }

    /// Convert into the session handed to the counter stores.
    pub fn into_session(self) -> UserSession {
        UserSession {
            user_id: self.id,
            display_name: self.display_name().to_string(),
        }
    }
}

/// Outcome of [`verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub valid: bool,
    pub claims: Option<UserClaims>,
}

impl Verification {
    fn rejected() -> Self {
        Self {
            valid: false,
            claims: None,
        }
    }
}

/// Verify init data and report validity with the parsed claims.
///
/// A payload whose hash matches but whose user claim cannot be parsed is
/// still invalid.
pub fn verify(raw_payload: &str, secret: &[u8]) -> Verification {
    match verify_claims(raw_payload, secret) {
        Ok(claims) => Verification {
            valid: true,
            claims: Some(claims),
        },
        Err(_) => Verification::rejected(),
    }
}

/// Verify init data and extract the authenticated user.
pub fn verify_and_extract_user(raw_payload: &str, secret: &[u8]) -> Result<UserSession> {
    verify_claims(raw_payload, secret).map(UserClaims::into_session)
}

/// Verify init data, naming the reason on rejection.
pub fn verify_claims(raw_payload: &str, secret: &[u8]) -> Result<UserClaims> {
    let mut fields = parse_fields(raw_payload)?;
    let received = fields.remove(HASH_FIELD).ok_or(Error::MissingHash)?;

    let expected = expected_hash(&fields, secret).ok_or(Error::SignatureMismatch)?;
    if !bool::from(expected.as_bytes().ct_eq(received.as_bytes())) {
        return Err(Error::SignatureMismatch);
    }

    extract_claims(&fields)
}

/// Build a signed init-data query string from the given fields.
///
/// Fields keep their order; `hash` is appended last.
pub fn sign_init_data(fields: &[(&str, &str)], secret: &[u8]) -> String {
    let sorted: BTreeMap<String, String> = fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let hash = expected_hash(&sorted, secret).unwrap_or_default();

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    serializer.extend_pairs(fields.iter().copied());
    serializer.append_pair(HASH_FIELD, &hash);
    serializer.finish()
}

/// Canonical check string: pairs sorted by key, one `key=value` per line.
pub fn check_string(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn expected_hash(fields: &BTreeMap<String, String>, secret: &[u8]) -> Option<String> {
    let secret_key = hmac_sha256(SECRET_KEY_LABEL, secret)?;
    let digest = hmac_sha256(&secret_key, check_string(fields).as_bytes())?;
    Some(hex::encode(digest))
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(message);
    Some(mac.finalize().into_bytes().to_vec())
}

fn parse_fields(raw_payload: &str) -> Result<BTreeMap<String, String>> {
    if raw_payload.is_empty() {
        return Err(Error::MalformedPayload("empty payload".into()));
    }

    let mut fields = BTreeMap::new();
    for segment in raw_payload.split('&') {
        if !segment.contains('=') {
            return Err(Error::MalformedPayload("segment without '='".into()));
        }
        let Some((key, value)) = form_urlencoded::parse(segment.as_bytes()).next() else {
            return Err(Error::MalformedPayload("unreadable segment".into()));
        };
        if key.is_empty() {
            return Err(Error::MalformedPayload("empty key".into()));
        }

        match fields.entry(key.into_owned()) {
            Entry::Vacant(slot) => {
                slot.insert(value.into_owned());
            }
            Entry::Occupied(slot) => {
                return Err(Error::MalformedPayload(format!(
                    "duplicate key '{}'",
                    slot.key()
                )));
            }
        }
    }

    Ok(fields)
}

fn extract_claims(fields: &BTreeMap<String, String>) -> Result<UserClaims> {
    let claims = match fields.get(USER_FIELD) {
        Some(user) => serde_json::from_str::<UserClaims>(user)
            .map_err(|e| Error::InvalidUserClaim(e.to_string()))?,
        None => flat_claims(fields)?,
    };

    if claims.id <= 0 {
        return Err(Error::InvalidUserClaim(format!(
            "user id must be positive, got {}",
            claims.id
        )));
    }
    Ok(claims)
}

fn flat_claims(fields: &BTreeMap<String, String>) -> Result<UserClaims> {
    let id = fields
        .get("id")
        .ok_or_else(|| Error::InvalidUserClaim("missing user id".into()))?
        .parse::<UserId>()
        .map_err(|_| Error::InvalidUserClaim("id is not an integer".into()))?;

    Ok(UserClaims {
        id,
        username: fields.get("username").cloned(),
        first_name: fields.get("first_name").cloned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOB_HASH: &str = "7ca3cbf279da905ad5fdf8256299ca269a419b8b3b3fee5a289d5f5665c606b2";

    #[test]
    fn flat_payload_with_known_hash() {
        let raw = format!("id=7&username=bob&hash={BOB_HASH}");
        let verification = verify(&raw, b"S");

        assert!(verification.valid);
        assert_eq!(
            verification.claims,
            Some(UserClaims {
                id: 7,
                username: Some("bob".into()),
                first_name: None,
            })
        );
    }

    #[test]
    fn arbitrary_hash_is_rejected() {
        let raw = format!("id=7&username=bob&hash={}", "ab".repeat(32));
        assert_eq!(verify(&raw, b"S"), Verification::rejected());
        assert_eq!(
            verify_claims(&raw, b"S"),
            Err(Error::SignatureMismatch)
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let raw = format!("id=7&username=bob&hash={BOB_HASH}");
        assert!(!verify(&raw, b"T").valid);
    }

    #[test]
    fn json_user_field() {
        let raw = "query_id=AAH\
            &user=%7B%22id%22%3A42%2C%22first_name%22%3A%22Ann%22%2C%22username%22%3A%22ann%22%7D\
            &auth_date=1700000000\
            &hash=64d1b8aabc40c172b73c9d0d96c15802235617b1f2547f1e9ba0bf4434ea209a";

        let session = verify_and_extract_user(raw, b"123:ABC").unwrap();
        assert_eq!(
            session,
            UserSession {
                user_id: 42,
                display_name: "ann".into()
            }
        );
    }

    #[test]
    fn sign_produces_verifiable_payload() {
        let raw = sign_init_data(&[("id", "7"), ("username", "bob")], b"S");
        assert_eq!(raw, format!("id=7&username=bob&hash={BOB_HASH}"));
    }

    #[test]
    fn missing_hash() {
        assert_eq!(
            verify_claims("id=7&username=bob", b"S"),
            Err(Error::MissingHash)
        );
    }

    #[test]
    fn malformed_payloads() {
        for raw in ["", "id=7&&hash=00", "id7&hash=00", "=7&hash=00", "id=7&id=8&hash=00"] {
            assert!(
                matches!(verify_claims(raw, b"S"), Err(Error::MalformedPayload(_))),
                "expected malformed: {raw:?}"
            );
        }
    }

    #[test]
    fn signed_but_unparseable_user_is_rejected() {
        let raw = sign_init_data(&[("user", "{not json")], b"S");
        assert!(matches!(
            verify_claims(&raw, b"S"),
            Err(Error::InvalidUserClaim(_))
        ));
        assert!(!verify(&raw, b"S").valid);

        let raw = sign_init_data(&[("id", "seven")], b"S");
        assert!(matches!(
            verify_claims(&raw, b"S"),
            Err(Error::InvalidUserClaim(_))
        ));
    }

    #[test]
    fn non_positive_user_id_is_rejected() {
        for id in ["0", "-5"] {
            let raw = sign_init_data(&[("id", id), ("username", "bob")], b"S");
            assert!(matches!(
                verify_claims(&raw, b"S"),
                Err(Error::InvalidUserClaim(_))
            ));
        }

        let raw = sign_init_data(&[("user", r#"{"id":0,"username":"bob"}"#)], b"S");
        assert!(!verify(&raw, b"S").valid);
    }

    #[test]
    fn display_name_fallbacks() {
        let claims = UserClaims {
            id: 1,
            username: Some(String::new()),
            first_name: Some("Ann".into()),
        };
        assert_eq!(claims.display_name(), "Ann");

        let claims = UserClaims {
            id: 1,
            username: None,
            first_name: None,
        };
        assert_eq!(claims.into_session().display_name, "Unknown");
    }

    #[test]
    fn check_string_sorts_keys_bytewise() {
        let fields: BTreeMap<String, String> = [("b", "2"), ("B", "3"), ("a", "1")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(check_string(&fields), "B=3\na=1\nb=2");
    }
}
