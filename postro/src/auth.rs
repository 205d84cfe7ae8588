//! Password authentication: cleartext, MD5, and SCRAM-SHA-256.
//!
//! <https://www.postgresql.org/docs/current/auth-password.html>
//! <https://datatracker.ietf.org/doc/html/rfc5802>
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::common::unit_error;

type HmacSha256 = Hmac<Sha256>;

unit_error! {
    /// The server requested an authentication method that is not
    /// implemented (e.g. Kerberos, GSSAPI, SSPI).
    pub struct UnsupportedMethod("authentication method is not supported");
}

unit_error! {
    /// SASL mechanism offered by the server is not supported.
    pub struct UnsupportedSaslMechanism("server offered no supported SASL mechanism");
}

unit_error! {
    /// The server's SCRAM final message was missing or malformed.
    pub struct MalformedScramMessage("malformed SCRAM message from server");
}

unit_error! {
    /// The server's SCRAM signature did not match the computed signature.
    ///
    /// This means either the password is wrong, or the server is lying
    /// about being who it says it is.
    pub struct ScramSignatureMismatch("server SCRAM signature verification failed");
}

/// Any error produced while performing password authentication.
#[derive(Debug)]
pub enum AuthError {
    UnsupportedMethod(UnsupportedMethod),
    UnsupportedSaslMechanism(UnsupportedSaslMechanism),
    MalformedScramMessage(MalformedScramMessage),
    ScramSignatureMismatch(ScramSignatureMismatch),
}

impl std::error::Error for AuthError {}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedMethod(e) => write!(f, "{e}"),
            Self::UnsupportedSaslMechanism(e) => write!(f, "{e}"),
            Self::MalformedScramMessage(e) => write!(f, "{e}"),
            Self::ScramSignatureMismatch(e) => write!(f, "{e}"),
        }
    }
}

impl From<UnsupportedMethod> for AuthError {
    fn from(e: UnsupportedMethod) -> Self {
        Self::UnsupportedMethod(e)
    }
}

impl From<UnsupportedSaslMechanism> for AuthError {
    fn from(e: UnsupportedSaslMechanism) -> Self {
        Self::UnsupportedSaslMechanism(e)
    }
}

impl From<MalformedScramMessage> for AuthError {
    fn from(e: MalformedScramMessage) -> Self {
        Self::MalformedScramMessage(e)
    }
}

impl From<ScramSignatureMismatch> for AuthError {
    fn from(e: ScramSignatureMismatch) -> Self {
        Self::ScramSignatureMismatch(e)
    }
}

/// `"md5" + hex(md5(hex(md5(password + user)) + salt))`
pub(crate) fn md5_password(user: &str, password: &str, salt: [u8; 4]) -> String {
    use md5::{Digest as _, Md5};

    let mut inner = Md5::new();
    inner.update(password.as_bytes());
    inner.update(user.as_bytes());
    let inner_hex = hex(&inner.finalize());

    let mut outer = Md5::new();
    outer.update(inner_hex.as_bytes());
    outer.update(salt);
    let outer_hex = hex(&outer.finalize());

    format!("md5{outer_hex}")
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(out, "{b:02x}").unwrap();
    }
    out
}

const SASL_MECHANISM: &str = "SCRAM-SHA-256";
const NONCE_LEN: usize = 18;

/// Client-side state for a SCRAM-SHA-256 exchange, threaded through the
/// three round trips: `client-first`, `client-final`, and server-signature
/// verification.
pub(crate) struct ScramClient {
    client_nonce: String,
    client_first_bare: String,
    password: String,
}

impl ScramClient {
    /// Pick a mechanism from the server's offered list and build the
    /// `client-first-message`.
    pub(crate) fn new(mechanisms: &str, password: &str) -> Result<(Self, String), UnsupportedSaslMechanism> {
        if !mechanisms.split('\0').any(|m| m == SASL_MECHANISM) {
            return Err(UnsupportedSaslMechanism);
        }

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let client_nonce = base64::engine::general_purpose::STANDARD.encode(nonce_bytes);

        let client_first_bare = format!("n={},r={}", "", client_nonce);
        let client_first_message = format!("n,,{client_first_bare}");

        Ok((
            Self {
                client_nonce,
                client_first_bare,
                password: password.to_owned(),
            },
            client_first_message,
        ))
    }

    /// Given the server's `server-first-message`, derive the keys and build
    /// the `client-final-message`, also returning the expected server
    /// signature so the final exchange can be verified.
    pub(crate) fn client_final(
        &self,
        server_first: &str,
    ) -> Result<(String, [u8; 32]), MalformedScramMessage> {
        let mut server_nonce = None;
        let mut salt = None;
        let mut iterations = None;

        for part in server_first.split(',') {
            if let Some(v) = part.strip_prefix("r=") {
                server_nonce = Some(v);
            } else if let Some(v) = part.strip_prefix("s=") {
                salt = Some(v);
            } else if let Some(v) = part.strip_prefix("i=") {
                iterations = v.parse().ok();
            }
        }

        let server_nonce = server_nonce.ok_or(MalformedScramMessage)?;
        let salt = salt.ok_or(MalformedScramMessage)?;
        let iterations: u32 = iterations.ok_or(MalformedScramMessage)?;

        if !server_nonce.starts_with(&self.client_nonce) {
            return Err(MalformedScramMessage);
        }

        let salt = base64::engine::general_purpose::STANDARD
            .decode(salt)
            .map_err(|_| MalformedScramMessage)?;

        let mut salted_password = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(self.password.as_bytes(), &salt, iterations, &mut salted_password);

        let client_key = hmac_sha256(&salted_password, b"Client Key");
        let stored_key = Sha256::digest(client_key);
        let server_key = hmac_sha256(&salted_password, b"Server Key");

        let channel_binding = base64::engine::general_purpose::STANDARD.encode("n,,");
        let client_final_without_proof = format!("c={channel_binding},r={server_nonce}");

        let auth_message =
            format!("{},{},{}", self.client_first_bare, server_first, client_final_without_proof);

        let client_signature = hmac_sha256(&stored_key, auth_message.as_bytes());
        let client_proof: Vec<u8> = client_key.iter().zip(client_signature.iter()).map(|(a, b)| a ^ b).collect();
        let client_proof = base64::engine::general_purpose::STANDARD.encode(client_proof);

        let server_signature = hmac_sha256(&server_key, auth_message.as_bytes());

        let client_final_message = format!("{client_final_without_proof},p={client_proof}");

        Ok((client_final_message, server_signature))
    }

    /// Verify the server's `v=` signature in its `server-final-message`
    /// against the signature computed in [`Self::client_final`].
    pub(crate) fn verify_server_final(
        server_final: &str,
        expected: [u8; 32],
    ) -> Result<(), AuthError> {
        let value = server_final.strip_prefix("v=").ok_or(MalformedScramMessage)?;
        let got = base64::engine::general_purpose::STANDARD
            .decode(value)
            .map_err(|_| MalformedScramMessage)?;

        if got != expected {
            return Err(ScramSignatureMismatch.into());
        }

        Ok(())
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_mechanism_list_without_scram_sha_256() {
        let err = ScramClient::new("SCRAM-SHA-1,GS2-KRB5", "pencil");
        assert!(err.is_err());
    }

    #[test]
    fn client_final_round_trips_against_its_own_server_signature() {
        let (client, client_first) = ScramClient::new(SASL_MECHANISM, "pencil").unwrap();
        assert!(client_first.starts_with("n,,n=,r="));

        // Simulate a server appending its own nonce suffix to the client nonce,
        // and returning a salt/iteration count, per RFC 5802 section 3.
        let server_nonce = format!("{}{}", client.client_nonce, "server-supplied-suffix");
        let salt_b64 = base64::engine::general_purpose::STANDARD.encode(b"0123456789abcdef");
        let server_first = format!("r={server_nonce},s={salt_b64},i=4096");

        let (client_final, expected_signature) = client.client_final(&server_first).unwrap();
        assert!(client_final.contains(&format!("r={server_nonce}")));
        assert!(client_final.contains("c=biws"));
        assert!(client_final.contains(",p="));

        // A correctly-behaving server would compute the identical signature and
        // send it back verbatim as `v=<base64>`.
        let server_final = format!(
            "v={}",
            base64::engine::general_purpose::STANDARD.encode(expected_signature)
        );
        ScramClient::verify_server_final(&server_final, expected_signature).unwrap();
    }

    #[test]
    fn verify_server_final_rejects_tampered_signature() {
        let (client, _) = ScramClient::new(SASL_MECHANISM, "pencil").unwrap();
        let server_nonce = format!("{}{}", client.client_nonce, "server-supplied-suffix");
        let salt_b64 = base64::engine::general_purpose::STANDARD.encode(b"0123456789abcdef");
        let server_first = format!("r={server_nonce},s={salt_b64},i=4096");

        let (_, expected_signature) = client.client_final(&server_first).unwrap();

        let mut tampered = expected_signature;
        tampered[0] ^= 0xff;
        let server_final = format!("v={}", base64::engine::general_purpose::STANDARD.encode(tampered));

        let err = ScramClient::verify_server_final(&server_final, expected_signature);
        assert!(matches!(err, Err(AuthError::ScramSignatureMismatch(_))));
    }

    #[test]
    fn client_final_rejects_server_nonce_not_extending_client_nonce() {
        let (client, _) = ScramClient::new(SASL_MECHANISM, "pencil").unwrap();
        let salt_b64 = base64::engine::general_purpose::STANDARD.encode(b"0123456789abcdef");
        let server_first = format!("r=totally-different-nonce,s={salt_b64},i=4096");

        assert!(client.client_final(&server_first).is_err());
    }

    #[test]
    fn client_final_rejects_missing_fields() {
        let (client, _) = ScramClient::new(SASL_MECHANISM, "pencil").unwrap();
        assert!(client.client_final("s=,i=4096").is_err());
        assert!(client.client_final(&format!("r={}", client.client_nonce)).is_err());
    }
}
