//! Certificate pinning.
//!
//! Pins are SHA-256 digests of the full DER-encoded leaf certificate, written
//! as `sha256/<base64>`. Note the digest covers the whole certificate and not
//! its subject public key info, so a reissued certificate no longer matches
//! even when the key is unchanged.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

/// Prefix of a pin string.
pub const PIN_PREFIX: &str = "sha256/";

/// Base64 SHA-256 digest of a DER-encoded certificate.
pub fn fingerprint(certificate: &[u8]) -> String {
    BASE64.encode(Sha256::digest(certificate))
}

/// Pin string (`sha256/<base64>`) for a DER-encoded certificate.
pub fn pin_for(certificate: &[u8]) -> String {
    format!("{}{}", PIN_PREFIX, fingerprint(certificate))
}

/// Returns true if the pin is `sha256/` followed by the base64 of a 32-byte digest.
pub fn is_well_formed_pin(pin: &str) -> bool {
    pin.strip_prefix(PIN_PREFIX)
        .and_then(|digest| BASE64.decode(digest).ok())
        .is_some_and(|digest| digest.len() == 32)
}

fn normalize_host(hostname: &str) -> String {
    hostname.trim_end_matches('.').to_ascii_lowercase()
}

/// Hostname to pin-set registry.
///
/// Read-mostly and shared by every in-flight request.
#[derive(Debug, Default)]
pub struct CertificatePinner {
    pins: RwLock<HashMap<String, Vec<String>>>,
}

impl CertificatePinner {
    /// Creates an empty pinner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the pin set for a host. An empty set removes pinning for it.
    pub fn add_pins<I, S>(&self, hostname: &str, pins: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set: Vec<String> = Vec::new();
        for pin in pins {
            let pin = pin.into();
            if !set.contains(&pin) {
                set.push(pin);
            }
        }

        let host = normalize_host(hostname);
        tracing::debug!(host = %host, pins = set.len(), "Registering certificate pins");

        let mut registry = self.pins.write();
        if set.is_empty() {
            registry.remove(&host);
        } else {
            registry.insert(host, set);
        }
    }

    /// Returns true if pins are registered for the host.
    pub fn has_pin(&self, hostname: &str) -> bool {
        self.pins.read().contains_key(&normalize_host(hostname))
    }

    /// Returns the pins registered for the host.
    pub fn pins(&self, hostname: &str) -> Option<Vec<String>> {
        self.pins.read().get(&normalize_host(hostname)).cloned()
    }

    /// Checks a DER-encoded certificate against the host's pins.
    ///
    /// Hosts without pins always pass; trust then rests with the platform.
    pub fn check(&self, hostname: &str, certificate: &[u8]) -> bool {
        let registry = self.pins.read();
        let Some(pins) = registry.get(&normalize_host(hostname)) else {
            return true;
        };

        let digest = fingerprint(certificate);
        pins.iter()
            .any(|pin| pin.strip_prefix(PIN_PREFIX).unwrap_or(pin) == digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CERT_A: &[u8] = b"0\x82\x01\x0adummy-der-certificate-a";
    const CERT_B: &[u8] = b"0\x82\x01\x0adummy-der-certificate-b";

    #[test]
    fn test_unpinned_host_always_passes() {
        let pinner = CertificatePinner::new();
        assert!(!pinner.has_pin("example.com"));
        assert!(pinner.check("example.com", CERT_A));
        assert!(pinner.check("example.com", b""));
    }

    #[test]
    fn test_pinned_host_matches_digest_only() {
        let pinner = CertificatePinner::new();
        pinner.add_pins("example.com", [pin_for(CERT_A)]);

        assert!(pinner.has_pin("example.com"));
        assert!(pinner.check("example.com", CERT_A));
        assert!(!pinner.check("example.com", CERT_B));
        assert!(pinner.check("other.com", CERT_B));
    }

    #[test]
    fn test_known_digest() {
        // SHA-256 of the empty input.
        assert_eq!(fingerprint(b""), "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=");

        let pinner = CertificatePinner::new();
        pinner.add_pins("example.com", ["sha256/47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="]);
        assert!(pinner.check("example.com", b""));
    }

    #[test]
    fn test_last_write_replaces() {
        let pinner = CertificatePinner::new();
        pinner.add_pins("example.com", [pin_for(CERT_A)]);
        pinner.add_pins("example.com", [pin_for(CERT_B)]);

        assert!(!pinner.check("example.com", CERT_A));
        assert!(pinner.check("example.com", CERT_B));
    }

    #[test]
    fn test_empty_set_disables_pinning() {
        let pinner = CertificatePinner::new();
        pinner.add_pins("example.com", [pin_for(CERT_A)]);
        pinner.add_pins("example.com", Vec::<String>::new());

        assert!(!pinner.has_pin("example.com"));
        assert!(pinner.check("example.com", CERT_B));
    }

    #[test]
    fn test_hostnames_are_case_insensitive() {
        let pinner = CertificatePinner::new();
        pinner.add_pins("API.Example.COM", [pin_for(CERT_A)]);

        assert!(pinner.has_pin("api.example.com"));
        assert!(!pinner.check("api.example.com.", CERT_B));
    }

    #[test]
    fn test_pins_are_stored_verbatim_and_deduplicated() {
        let pinner = CertificatePinner::new();
        pinner.add_pins("example.com", ["sha256/AAAA", "sha256/AAAA", "sha256/BBBB"]);
        assert_eq!(
            pinner.pins("example.com"),
            Some(vec!["sha256/AAAA".to_string(), "sha256/BBBB".to_string()])
        );
    }

    #[test]
    fn test_reissued_certificate_with_same_key_does_not_match() {
        // Both certificates carry the same public key but differ in validity
        // dates; the digest covers the whole certificate, so only the first
        // one matches.
        let original: &[u8] = b"SPKI:same-key|notAfter:2025-01-01";
        let reissued: &[u8] = b"SPKI:same-key|notAfter:2026-01-01";

        let pinner = CertificatePinner::new();
        pinner.add_pins("example.com", [pin_for(original)]);

        assert!(pinner.check("example.com", original));
        assert!(!pinner.check("example.com", reissued));
    }

    #[test]
    fn test_well_formed_pin() {
        assert!(is_well_formed_pin(&pin_for(CERT_A)));
        assert!(!is_well_formed_pin(&fingerprint(CERT_A)));
        assert!(!is_well_formed_pin("sha256/AAAA"));
        assert!(!is_well_formed_pin("sha1/47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="));
    }
}
