use ucoin_core::error::UcoinError;
use ucoin_core::hash::sha1_hex;
use ucoin_core::types::Fingerprint;

/// Checks a detached signature over a raw document.
///
/// Signature formats (PGP armor, key lookup) live behind this trait.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, issuer: &Fingerprint, raw: &str, signature: &str) -> bool;
}

/// Produces this node's detached signatures.
pub trait DetachedSigner: Send + Sync {
    fn fingerprint(&self) -> &Fingerprint;
    fn sign(&self, raw: &str) -> Result<String, UcoinError>;
}

// ── DigestSigner ─────────────────────────────────────────────────────────────

/// Keyed-digest signature scheme for local simulations and tests.
///
/// The "signature" is `SHA1(fingerprint ‖ raw)` wrapped in armor lines, so
/// anyone can forge it. It is also a `SignatureVerifier` for any issuer.
#[derive(Clone, Debug)]
pub struct DigestSigner {
    fingerprint: Fingerprint,
}

impl DigestSigner {
    pub const BEGIN: &'static str = "-----BEGIN DIGEST SIGNATURE-----\n";
    pub const END: &'static str = "-----END DIGEST SIGNATURE-----\n";

    pub fn new(fingerprint: Fingerprint) -> Self {
        Self { fingerprint }
    }

    fn digest(issuer: &Fingerprint, raw: &str) -> String {
        sha1_hex(format!("{issuer}{raw}").as_bytes())
    }

    /// Signature of `raw` as `issuer` would produce it.
    pub fn signature_for(issuer: &Fingerprint, raw: &str) -> String {
        format!("{}{}\n{}", Self::BEGIN, Self::digest(issuer, raw), Self::END)
    }
}

impl DetachedSigner for DigestSigner {
    fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    fn sign(&self, raw: &str) -> Result<String, UcoinError> {
        Ok(Self::signature_for(&self.fingerprint, raw))
    }
}

impl SignatureVerifier for DigestSigner {
    fn verify(&self, issuer: &Fingerprint, raw: &str, signature: &str) -> bool {
        signature == Self::signature_for(issuer, raw)
    }
}
