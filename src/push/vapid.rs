//! VAPID (RFC 8292) token construction over ECDSA P-256.
//!
//! Keys are configured as base64url strings: the public key is the 65-byte
//! uncompressed SEC1 point, the private key the raw 32-byte scalar. They are
//! decoded on every use so a misconfigured key surfaces as a send error and
//! through [`VapidSigner::check_key_pair`] rather than preventing startup.

use base64::{URL_SAFE_NO_PAD, decode_config, encode_config};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::Serialize;
use time::OffsetDateTime;

use crate::config;
use crate::types::push::{KeyPairCheck, VapidConfig};

const TOKEN_TTL_SECONDS: i64 = 12 * 60 * 60;
const PUBLIC_KEY_LEN: usize = 65;
const PRIVATE_KEY_LEN: usize = 32;
const COMPONENT_LEN: usize = 32;
const KEY_CHECK_PLAINTEXT: &[u8] = b"push-reminders-vapid-check";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VapidError {
    #[error("vapid_key_invalid")]
    KeyInvalid,
    #[error("ecdsa_signature_invalid")]
    SignatureInvalid,
    #[error("push_endpoint_invalid")]
    EndpointInvalid,
    #[error("vapid_claims_invalid")]
    ClaimsInvalid,
}

#[derive(Debug, Clone)]
pub struct VapidCredentials {
    pub private_key: String,
    pub public_key: String,
}

#[derive(Debug, Clone)]
pub(crate) enum VapidConfigStatus {
    Missing,
    Incomplete,
    Ready(VapidConfig),
}

pub(crate) fn load_vapid_config(config: &config::AppConfig) -> VapidConfigStatus {
    let private_key = non_empty(config.vapid_private_key.as_deref());
    let public_key = non_empty(config.vapid_public_key.as_deref());
    let subject = non_empty(config.vapid_subject.as_deref());
    let has_any = private_key.is_some() || public_key.is_some() || subject.is_some();

    match (private_key, public_key, subject) {
        (Some(private_key), Some(public_key), Some(subject)) => {
            VapidConfigStatus::Ready(VapidConfig {
                private_key: private_key.to_string(),
                public_key: public_key.to_string(),
                subject: subject.to_string(),
            })
        }
        _ if has_any => VapidConfigStatus::Incomplete,
        _ => VapidConfigStatus::Missing,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[derive(Serialize)]
struct JwtHeader {
    typ: &'static str,
    alg: &'static str,
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    aud: &'a str,
    exp: i64,
    sub: &'a str,
}

#[derive(Debug, Clone)]
pub struct VapidSigner {
    public_key: String,
    private_key: String,
    subject: String,
}

impl VapidSigner {
    pub fn new(config: &VapidConfig) -> Self {
        Self {
            public_key: config.public_key.trim().to_string(),
            private_key: config.private_key.trim().to_string(),
            subject: config.subject.clone(),
        }
    }

    /// The configured public key as given, for the `k=` / `p256ecdsa=` header parameters.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn build_jwt(&self, endpoint: &str) -> Result<String, VapidError> {
        self.build_jwt_at(endpoint, OffsetDateTime::now_utc())
    }

    /// Builds a compact ES256 JWS whose audience is the origin of `endpoint`.
    pub fn build_jwt_at(&self, endpoint: &str, now: OffsetDateTime) -> Result<String, VapidError> {
        let (signing_key, _) = self.load_keys()?;
        let audience = endpoint_origin(endpoint)?;

        let header = encode_json(&JwtHeader {
            typ: "JWT",
            alg: "ES256",
        })?;
        let claims = encode_json(&JwtClaims {
            aud: &audience,
            exp: now.unix_timestamp() + TOKEN_TTL_SECONDS,
            sub: &self.subject,
        })?;

        let signing_input = format!("{header}.{claims}");
        let signature = sign_jose(&signing_key, signing_input.as_bytes())?;
        Ok(format!(
            "{signing_input}.{}",
            encode_config(signature, URL_SAFE_NO_PAD)
        ))
    }

    /// Signs a fixed plaintext with the private key and verifies it with the
    /// public key. Diagnostic only.
    pub fn check_key_pair(&self) -> KeyPairCheck {
        let public_bytes = decode_key(&self.public_key).unwrap_or_default();
        let private_bytes = decode_key(&self.private_key).unwrap_or_default();
        let pair_valid = match self.load_keys() {
            Ok((signing_key, verifying_key)) => sign_jose(&signing_key, KEY_CHECK_PLAINTEXT)
                .ok()
                .and_then(|raw| Signature::from_slice(&raw).ok())
                .is_some_and(|signature| {
                    verifying_key
                        .verify(KEY_CHECK_PLAINTEXT, &signature)
                        .is_ok()
                }),
            Err(_) => false,
        };

        KeyPairCheck {
            pair_valid,
            public_key_length: public_bytes.len(),
            private_key_length: private_bytes.len(),
        }
    }

    fn load_keys(&self) -> Result<(SigningKey, VerifyingKey), VapidError> {
        let public_bytes = decode_key(&self.public_key)?;
        let private_bytes = decode_key(&self.private_key)?;

        if public_bytes.len() != PUBLIC_KEY_LEN
            || public_bytes[0] != 0x04
            || private_bytes.len() != PRIVATE_KEY_LEN
        {
            return Err(VapidError::KeyInvalid);
        }

        let verifying_key =
            VerifyingKey::from_sec1_bytes(&public_bytes).map_err(|_| VapidError::KeyInvalid)?;
        let signing_key =
            SigningKey::from_slice(&private_bytes).map_err(|_| VapidError::KeyInvalid)?;
        Ok((signing_key, verifying_key))
    }
}

fn decode_key(raw: &str) -> Result<Vec<u8>, VapidError> {
    decode_config(raw.trim().trim_end_matches('='), URL_SAFE_NO_PAD)
        .map_err(|_| VapidError::KeyInvalid)
}

fn encode_json<T: Serialize>(value: &T) -> Result<String, VapidError> {
    let bytes = serde_json::to_vec(value).map_err(|_| VapidError::ClaimsInvalid)?;
    Ok(encode_config(bytes, URL_SAFE_NO_PAD))
}

pub(crate) fn endpoint_origin(endpoint: &str) -> Result<String, VapidError> {
    let url = reqwest::Url::parse(endpoint).map_err(|_| VapidError::EndpointInvalid)?;
    let origin = url.origin();
    if !origin.is_tuple() {
        return Err(VapidError::EndpointInvalid);
    }
    Ok(origin.ascii_serialization())
}

/// ECDSA P-256/SHA-256 signature in the fixed 64-byte `r || s` form.
fn sign_jose(key: &SigningKey, message: &[u8]) -> Result<[u8; 64], VapidError> {
    let signature: Signature = key.sign(message);
    der_to_jose(signature.to_der().as_bytes())
}

/// Converts an ASN.1 DER `SEQUENCE { INTEGER r, INTEGER s }` into JOSE `r || s`.
pub(crate) fn der_to_jose(der: &[u8]) -> Result<[u8; 64], VapidError> {
    let (&tag, rest) = der.split_first().ok_or(VapidError::SignatureInvalid)?;
    if tag != 0x30 {
        return Err(VapidError::SignatureInvalid);
    }
    let (&len, body) = rest.split_first().ok_or(VapidError::SignatureInvalid)?;
    // P-256 signatures never need long-form lengths.
    if usize::from(len) != body.len() {
        return Err(VapidError::SignatureInvalid);
    }

    let (r, body) = read_integer(body)?;
    let (s, body) = read_integer(body)?;
    if !body.is_empty() {
        return Err(VapidError::SignatureInvalid);
    }

    let mut out = [0u8; 64];
    out[..COMPONENT_LEN].copy_from_slice(&fit_component(r)?);
    out[COMPONENT_LEN..].copy_from_slice(&fit_component(s)?);
    Ok(out)
}

fn read_integer(input: &[u8]) -> Result<(&[u8], &[u8]), VapidError> {
    match input {
        [0x02, len, rest @ ..] if usize::from(*len) <= rest.len() => {
            Ok(rest.split_at(usize::from(*len)))
        }
        _ => Err(VapidError::SignatureInvalid),
    }
}

fn fit_component(mut value: &[u8]) -> Result<[u8; COMPONENT_LEN], VapidError> {
    while value.len() > COMPONENT_LEN && value[0] == 0 {
        value = &value[1..];
    }
    if value.len() > COMPONENT_LEN {
        return Err(VapidError::SignatureInvalid);
    }
    let mut out = [0u8; COMPONENT_LEN];
    out[COMPONENT_LEN - value.len()..].copy_from_slice(value);
    Ok(out)
}

pub fn generate_vapid_credentials() -> VapidCredentials {
    let mut rng = OsRng;
    generate_vapid_credentials_with_rng(&mut rng)
}

pub(crate) fn generate_vapid_credentials_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> VapidCredentials {
    let signing_key = SigningKey::random(rng);
    let public_key = signing_key.verifying_key().to_encoded_point(false);

    VapidCredentials {
        private_key: encode_config(signing_key.to_bytes(), URL_SAFE_NO_PAD),
        public_key: encode_config(public_key.as_bytes(), URL_SAFE_NO_PAD),
    }
}
