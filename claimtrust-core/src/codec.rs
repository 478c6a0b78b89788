//! Key and claim encodings.
//!
//! Two concerns live here:
//!
//! - **PEM**: keys travel as PEM text (config files, registry records). The
//!   decoder is deliberately lenient about layout. Registries often store
//!   keys with the armor and body on one line, or with stray whitespace, so
//!   every `-----LABEL-----` run and all whitespace are stripped before the
//!   body is base64-decoded.
//! - **Canonical claims**: signer and verifier must hash the same bytes.
//!   [`canonicalize`] emits compact JSON with object keys sorted at every
//!   depth.

use crate::claims::ClaimSet;
use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Width of a PEM body line.
const PEM_LINE_WIDTH: usize = 64;

/// The kind of key a PEM document is expected to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// PKCS#8 `PRIVATE KEY`.
    Private,
    /// SubjectPublicKeyInfo `PUBLIC KEY`.
    Public,
}

impl KeyKind {
    /// PEM label for this kind.
    pub fn label(self) -> &'static str {
        match self {
            KeyKind::Private => "PRIVATE KEY",
            KeyKind::Public => "PUBLIC KEY",
        }
    }
}

/// Decode a PEM key into its DER bytes.
///
/// Armor is optional. When present, every `BEGIN`/`END` label must name
/// `kind`; a private key handed where a public key is expected is rejected
/// here rather than surfacing later as an opaque DER error.
pub fn decode_pem_key(pem: &str, kind: KeyKind) -> Result<Vec<u8>> {
    let (labels, body) = strip_armor(pem)?;

    for label in &labels {
        let name = label
            .strip_prefix("BEGIN ")
            .or_else(|| label.strip_prefix("END "))
            .unwrap_or(label);
        if name != kind.label() {
            return Err(Error::InvalidPem(format!(
                "expected {}, found '{}'",
                kind.label(),
                label
            )));
        }
    }

    if body.is_empty() {
        return Err(Error::InvalidPem("empty key body".to_string()));
    }

    STANDARD
        .decode(body.as_bytes())
        .map_err(|e| Error::InvalidPem(format!("invalid base64 body: {}", e)))
}

/// Encode DER bytes as a PEM document with LF line endings.
pub fn encode_pem(der: &[u8], kind: KeyKind) -> String {
    let body = STANDARD.encode(der);
    let mut out = String::with_capacity(body.len() + 64);
    out.push_str("-----BEGIN ");
    out.push_str(kind.label());
    out.push_str("-----\n");
    // base64 output is ASCII, so byte chunks are valid str boundaries
    for chunk in body.as_bytes().chunks(PEM_LINE_WIDTH) {
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
    out.push_str("-----END ");
    out.push_str(kind.label());
    out.push_str("-----\n");
    out
}

/// Canonical byte form of a claim set: compact JSON, keys sorted recursively.
pub fn canonicalize(claims: &ClaimSet) -> Result<Vec<u8>> {
    // ClaimSet is BTreeMap-backed at every level, so serde_json already
    // emits keys in sorted order.
    serde_json::to_vec(claims).map_err(|e| Error::SerializationError(e.to_string()))
}

/// Split `pem` into its armor labels and the whitespace-free body.
///
/// An armor run is one or more `-`, then upper-case letters and spaces, then
/// one or more `-`. Base64 never contains `-`, so any other dash is an error.
fn strip_armor(pem: &str) -> Result<(Vec<String>, String)> {
    let bytes = pem.as_bytes();
    let mut labels = Vec::new();
    let mut body = String::with_capacity(pem.len());
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'-' {
            let open_end = skip_while(bytes, i, |c| c == b'-');
            let label_end = skip_while(bytes, open_end, |c| c.is_ascii_uppercase() || c == b' ');
            let close_end = skip_while(bytes, label_end, |c| c == b'-');
            if label_end == open_end || close_end == label_end {
                return Err(Error::InvalidPem("malformed armor line".to_string()));
            }
            labels.push(pem[open_end..label_end].trim().to_string());
            i = close_end;
        } else {
            if !b.is_ascii_whitespace() {
                body.push(b as char);
            }
            i += 1;
        }
    }

    Ok((labels, body))
}

fn skip_while(bytes: &[u8], start: usize, pred: impl Fn(u8) -> bool) -> usize {
    let mut i = start;
    while i < bytes.len() && pred(bytes[i]) {
        i += 1;
    }
    i
}
