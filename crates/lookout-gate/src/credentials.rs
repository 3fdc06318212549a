use std::fmt;

use lookout_proto::ClientAuth;
use sha2::{Digest, Sha256};

use crate::GateError;

const CREDENTIAL_SALT: &[u8] = b"lookout-credential-salt";

fn sha256_hex(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}

/// Compares two byte strings without short-circuiting on the first
/// difference.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Random nonce for [`ClientAuth::public_key`], hex encoded.
pub fn generate_public_key() -> Result<String, GateError> {
    let mut bytes = [0u8; 16];
    getrandom::getrandom(&mut bytes).map_err(|err| GateError::Random(err.to_string()))?;
    Ok(hex::encode(bytes))
}

/// Salted SHA-256 of the connector password. The raw password is never kept.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}

impl PasswordHash {
    pub fn derive(password: &str) -> Result<Self, GateError> {
        if password.is_empty() {
            return Err(GateError::EmptyPassword);
        }
        Ok(Self(sha256_hex(&[password.as_bytes(), CREDENTIAL_SALT])))
    }

    /// Accepts a hash produced earlier by [`PasswordHash::derive`].
    pub fn from_hex(hash: &str) -> Result<Self, GateError> {
        let hash = hash.trim();
        let well_formed = hash.len() == 64
            && hash
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return Err(GateError::InvalidPasswordHash);
        }
        Ok(Self(hash.to_string()))
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// Token a client must present together with `public_key`.
    ///
    /// The client chooses `public_key` and the server keeps no record of
    /// keys already seen. A captured `(public_key, token)` pair therefore
    /// authenticates anyone who resends it, until the password changes.
    /// Deployments that need more should require `ssl_only`.
    pub fn client_token(&self, public_key: &str) -> String {
        sha256_hex(&[self.0.as_bytes(), public_key.as_bytes()])
    }

    pub fn verify_client(&self, auth: &ClientAuth) -> bool {
        if auth.public_key.is_empty() {
            return false;
        }
        let expected = self.client_token(&auth.public_key);
        constant_time_eq(expected.as_bytes(), auth.token.as_bytes())
    }

    /// Signature over evaluation code. It binds the code only, so a captured
    /// signed request can be resent as long as the password is unchanged.
    pub fn sign_eval(&self, code: &str) -> String {
        sha256_hex(&[code.as_bytes(), self.0.as_bytes()])
    }

    pub fn verify_eval(&self, code: &str, signature: &str) -> bool {
        constant_time_eq(self.sign_eval(code).as_bytes(), signature.as_bytes())
    }
}
