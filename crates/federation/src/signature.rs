//! draft-cavage HTTP signatures.
//!
//! Outgoing requests are signed over `(request-target) host date` and, when a
//! body is present, `digest`. Incoming requests are verified against whatever
//! header list the sender declared.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use pkcs8::{DecodePrivateKey, DecodePublicKey};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use rsa::{
    RsaPrivateKey, RsaPublicKey,
    pkcs1v15::{SigningKey, VerifyingKey},
};
use sha2::{Digest, Sha256};
use signature::{SignatureEncoding, Signer, Verifier};
use tracing::{debug, warn};
use url::Url;

use crate::clock::http_date;
use crate::error::FederationError;

/// Largest accepted distance, in seconds, between a signed `Date` and now.
pub const MAX_CLOCK_SKEW_SECS: i64 = 12 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("signing failed: {0}")]
    SigningFailed(String),
    #[error("verification failed: {0}")]
    VerificationFailed(String),
    #[error("missing header: {0}")]
    MissingHeader(String),
    #[error("invalid signature header")]
    InvalidSignatureHeader,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("signature date outside the accepted window")]
    ExpiredSignature,
    #[error("invalid date header")]
    InvalidDateFormat,
    #[error("digest does not match body")]
    DigestMismatch,
}

impl From<SignatureError> for FederationError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::InvalidPrivateKey(_) | SignatureError::SigningFailed(_) => {
                Self::Internal(err.to_string())
            }
            SignatureError::InvalidUrl(_) => Self::BadRequest(err.to_string()),
            other => Self::Unauthorized(other.to_string()),
        }
    }
}

/// Signs outgoing requests on behalf of one key.
pub struct HttpSigner {
    private_key: RsaPrivateKey,
    key_id: String,
}

impl std::fmt::Debug for HttpSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSigner")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl HttpSigner {
    /// Signer from a PKCS#8 PEM private key.
    pub fn new(private_key_pem: &str, key_id: impl Into<String>) -> Result<Self, SignatureError> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(private_key_pem)
            .map_err(|e| SignatureError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self {
            private_key,
            key_id: key_id.into(),
        })
    }

    /// Key id advertised in the `Signature` header.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Headers (`Host`, `Date`, `Digest`, `Signature`) to attach to a request.
    pub fn sign_request(
        &self,
        method: &str,
        url: &Url,
        body: Option<&[u8]>,
        now: DateTime<Utc>,
    ) -> Result<HeaderMap, SignatureError> {
        let host = url
            .host_str()
            .ok_or_else(|| SignatureError::InvalidUrl(format!("no host in {url}")))?;
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let target = request_target(method, url.path(), url.query());
        let date = http_date(now);
        let digest = body.map(calculate_digest);

        let mut signed = vec![
            ("(request-target)", target),
            ("host", host.clone()),
            ("date", date.clone()),
        ];
        if let Some(digest) = &digest {
            signed.push(("digest", digest.clone()));
        }

        let signing_string = signed
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect::<Vec<_>>()
            .join("\n");
        debug!(key_id = %self.key_id, %signing_string, "signing request");

        let signing_key = SigningKey::<Sha256>::new(self.private_key.clone());
        let signature = signing_key
            .try_sign(signing_string.as_bytes())
            .map_err(|e| SignatureError::SigningFailed(e.to_string()))?;

        let header_names = signed.iter().map(|(name, _)| *name).collect::<Vec<_>>().join(" ");
        let signature_header = format!(
            "keyId=\"{}\",algorithm=\"rsa-sha256\",headers=\"{header_names}\",signature=\"{}\"",
            self.key_id,
            BASE64.encode(signature.to_bytes())
        );

        let mut headers = HeaderMap::new();
        insert(&mut headers, "host", &host)?;
        insert(&mut headers, "date", &date)?;
        if let Some(digest) = &digest {
            insert(&mut headers, "digest", digest)?;
        }
        insert(&mut headers, "signature", &signature_header)?;
        Ok(headers)
    }
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) -> Result<(), SignatureError> {
    let value = HeaderValue::from_str(value)
        .map_err(|e| SignatureError::SigningFailed(format!("{name}: {e}")))?;
    headers.insert(HeaderName::from_static(name), value);
    Ok(())
}

fn request_target(method: &str, path: &str, query: Option<&str>) -> String {
    match query {
        Some(query) => format!("{} {path}?{query}", method.to_lowercase()),
        None => format!("{} {path}", method.to_lowercase()),
    }
}

/// Parsed `Signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureComponents {
    pub key_id: String,
    pub algorithm: String,
    pub headers: Vec<String>,
    pub signature: String,
}

impl SignatureComponents {
    /// Parse `keyId="...",headers="...",signature="..."`.
    pub fn parse(header: &str) -> Result<Self, SignatureError> {
        let mut key_id = None;
        let mut algorithm = None;
        let mut headers = None;
        let mut signature = None;

        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            let value = value.trim_matches('"').to_string();
            match key {
                "keyId" => key_id = Some(value),
                "algorithm" => algorithm = Some(value),
                "headers" => headers = Some(value),
                "signature" => signature = Some(value),
                _ => {}
            }
        }

        Ok(Self {
            key_id: key_id.ok_or(SignatureError::InvalidSignatureHeader)?,
            algorithm: algorithm.unwrap_or_else(|| "rsa-sha256".to_string()),
            headers: headers
                .unwrap_or_else(|| "date".to_string())
                .split_whitespace()
                .map(str::to_lowercase)
                .collect(),
            signature: signature.ok_or(SignatureError::InvalidSignatureHeader)?,
        })
    }

    /// The key owner: the key id without its fragment.
    pub fn key_owner(&self) -> Result<Url, SignatureError> {
        let owner = self.key_id.split('#').next().unwrap_or_default();
        Url::parse(owner).map_err(|e| SignatureError::InvalidUrl(e.to_string()))
    }
}

/// Check a parsed signature against the request it arrived with.
pub fn verify_request(
    public_key_pem: &str,
    components: &SignatureComponents,
    method: &str,
    path_and_query: &str,
    headers: &HeaderMap,
) -> Result<(), SignatureError> {
    let public_key = RsaPublicKey::from_public_key_pem(public_key_pem)
        .map_err(|e| SignatureError::InvalidPublicKey(e.to_string()))?;

    let mut lines = Vec::with_capacity(components.headers.len());
    for name in &components.headers {
        let value = if name == "(request-target)" {
            format!("{} {path_and_query}", method.to_lowercase())
        } else {
            headers
                .get(name.as_str())
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| SignatureError::MissingHeader(name.clone()))?
                .to_string()
        };
        lines.push(format!("{name}: {value}"));
    }
    let signing_string = lines.join("\n");

    let bytes = BASE64
        .decode(&components.signature)
        .map_err(|e| SignatureError::VerificationFailed(e.to_string()))?;
    let signature = rsa::pkcs1v15::Signature::try_from(bytes.as_slice())
        .map_err(|e| SignatureError::VerificationFailed(e.to_string()))?;

    VerifyingKey::<Sha256>::new(public_key)
        .verify(signing_string.as_bytes(), &signature)
        .map_err(|e| {
            warn!(key_id = %components.key_id, error = %e, "signature mismatch");
            SignatureError::VerificationFailed(e.to_string())
        })
}

/// Reject `Date` headers too far from `now`.
pub fn check_date(headers: &HeaderMap, now: DateTime<Utc>) -> Result<(), SignatureError> {
    let Some(raw) = headers.get("date").and_then(|v| v.to_str().ok()) else {
        return Ok(());
    };
    let date = DateTime::parse_from_rfc2822(raw)
        .map_err(|_| SignatureError::InvalidDateFormat)?
        .with_timezone(&Utc);
    if (now - date).num_seconds().abs() > MAX_CLOCK_SKEW_SECS {
        return Err(SignatureError::ExpiredSignature);
    }
    Ok(())
}

/// `SHA-256=<base64>` digest of a body.
#[must_use]
pub fn calculate_digest(body: &[u8]) -> String {
    format!("SHA-256={}", BASE64.encode(Sha256::digest(body)))
}

/// Whether a `Digest` header matches the body.
pub fn verify_digest(body: &[u8], digest_header: &str) -> Result<(), SignatureError> {
    let expected = calculate_digest(body);
    let expected = expected.trim_start_matches("SHA-256=");
    let matches = digest_header
        .split(',')
        .filter_map(|part| part.trim().split_once('='))
        .any(|(algorithm, value)| algorithm.eq_ignore_ascii_case("SHA-256") && value == expected);
    if matches {
        Ok(())
    } else {
        Err(SignatureError::DigestMismatch)
    }
}
