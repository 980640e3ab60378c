//! Detached signing of Release files using sequoia-openpgp (pure Rust).
//!
//! Each configured key produces one ASCII-armored detached signature; the
//! signatures for a Release are concatenated in configured key order,
//! which is what APT expects in `Release.gpg` for multi-key repositories.

use crate::error::{Error, Result};
use log::{debug, warn};
use openpgp::armor;
use openpgp::cert::Cert;
use openpgp::crypto::{KeyPair, Password};
use openpgp::packet::key::{SecretParts, UnspecifiedRole};
use openpgp::packet::Key;
use openpgp::policy::StandardPolicy;
use openpgp::serialize::stream::{Armorer, Message, Signer};
use sequoia_openpgp as openpgp;
use std::io::Write;

/// How many extra unlock attempts a failed passphrase gets before the
/// failure is fatal. This tolerates flaky interactive entry, not invalid
/// credentials.
const UNLOCK_RETRIES: usize = 2;

/// Out-of-band secret entry for keys without a configured passphrase.
pub trait PassphraseSource: Send + Sync {
    /// Produce the passphrase for `key_id`. `attempt` starts at 0 and
    /// increments on every failed unlock.
    fn passphrase(&self, key_id: &str, attempt: usize) -> Result<String>;
}

/// Signs Release texts with one or more configured keys.
pub struct ReleaseSigner {
    keyring: Vec<Cert>,
    signers: Vec<String>,
    passphrases: Vec<Option<String>>,
    prompt: Option<Box<dyn PassphraseSource>>,
    policy: StandardPolicy<'static>,
}

impl ReleaseSigner {
    /// Create a signer over a keyring. `signers` selects the keys, by
    /// fingerprint, key ID or user-ID substring, in signing order.
    pub fn new(keyring: Vec<Cert>, signers: Vec<String>) -> Self {
        Self {
            keyring,
            signers,
            passphrases: Vec::new(),
            prompt: None,
            policy: StandardPolicy::new(),
        }
    }

    /// Provide passphrases, positionally paired with the signer list.
    pub fn with_passphrases(mut self, passphrases: Vec<Option<String>>) -> Self {
        self.passphrases = passphrases;
        self
    }

    /// Provide the out-of-band prompt used when a passphrase is missing.
    pub fn with_prompt(mut self, prompt: Box<dyn PassphraseSource>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Whether any signing keys are configured.
    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }

    /// Produce the concatenated detached signatures for one Release text.
    /// An unknown key identifier is fatal; so is an unlock that keeps
    /// failing after its retries.
    pub fn sign(&self, text: &str) -> Result<String> {
        let mut signatures = String::new();
        for (idx, id) in self.signers.iter().enumerate() {
            debug!("signing with key {}", id);
            let cert = self.find_cert(id)?;
            let key = self.signing_key(cert, id)?;
            let keypair = self.keypair_for(key, id, idx)?;
            signatures.push_str(&detached_signature(keypair, text)?);
        }
        Ok(signatures)
    }

    fn find_cert(&self, id: &str) -> Result<&Cert> {
        let needle = id.to_uppercase();
        self.keyring
            .iter()
            .find(|cert| {
                cert.keys().any(|ka| {
                    ka.key().fingerprint().to_hex() == needle
                        || ka.key().keyid().to_hex() == needle
                }) || cert.userids().any(|ua| {
                    String::from_utf8_lossy(ua.userid().value()).contains(id)
                })
            })
            .ok_or_else(|| Error::UnknownSigningKey(id.to_string()))
    }

    fn signing_key(&self, cert: &Cert, id: &str) -> Result<Key<SecretParts, UnspecifiedRole>> {
        cert.keys()
            .with_policy(&self.policy, None)
            .supported()
            .revoked(false)
            .for_signing()
            .secret()
            .next()
            .map(|ka| ka.key().clone())
            .ok_or_else(|| {
                Error::UnknownSigningKey(format!("{} has no usable secret signing key", id))
            })
    }

    /// Turn a secret key into a keypair, unlocking it when necessary. The
    /// unlocked material lives only in the returned keypair; the keyring
    /// copy stays locked.
    fn keypair_for(
        &self,
        key: Key<SecretParts, UnspecifiedRole>,
        id: &str,
        idx: usize,
    ) -> Result<KeyPair> {
        if !key.secret().is_encrypted() {
            return key.into_keypair().map_err(Error::signing);
        }
        let configured = self.passphrases.get(idx).and_then(Clone::clone);
        let mut attempt = 0;
        loop {
            let passphrase = match &configured {
                Some(passphrase) => passphrase.clone(),
                None => match &self.prompt {
                    Some(prompt) => prompt.passphrase(id, attempt)?,
                    None => {
                        return Err(Error::Signing(format!(
                            "no passphrase available for key {}",
                            id
                        )))
                    }
                },
            };
            match key.clone().decrypt_secret(&Password::from(passphrase.as_str())) {
                Ok(unlocked) => return unlocked.into_keypair().map_err(Error::signing),
                Err(err) => {
                    attempt += 1;
                    if attempt > UNLOCK_RETRIES {
                        return Err(Error::Signing(format!(
                            "could not unlock key {}: {}",
                            id, err
                        )));
                    }
                    warn!("failed to unlock key {} (attempt {}): {}", id, attempt, err);
                }
            }
        }
    }
}

fn detached_signature(keypair: KeyPair, text: &str) -> Result<String> {
    let mut sink = Vec::new();
    {
        let message = Message::new(&mut sink);
        let message = Armorer::new(message)
            .kind(armor::Kind::Signature)
            .build()
            .map_err(Error::signing)?;
        let mut signer = Signer::new(message, keypair)
            .detached()
            .build()
            .map_err(Error::signing)?;
        signer.write_all(text.as_bytes()).map_err(Error::signing)?;
        signer.finalize().map_err(Error::signing)?;
    }
    String::from_utf8(sink).map_err(Error::signing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use openpgp::cert::CertBuilder;
    use openpgp::parse::Parse;
    use openpgp::PacketPile;
    use std::sync::Mutex;

    fn generate(userid: &str, password: Option<&str>) -> Cert {
        let mut builder = CertBuilder::new()
            .add_userid(userid)
            .add_signing_subkey();
        if let Some(password) = password {
            builder = builder.set_password(Some(password.into()));
        }
        let (cert, _revocation) = builder.generate().unwrap();
        cert
    }

    fn verify(cert: &Cert, signature: &str, text: &str) -> bool {
        let pile = PacketPile::from_bytes(signature.as_bytes()).unwrap();
        let policy = StandardPolicy::new();
        for packet in pile.descendants() {
            if let openpgp::Packet::Signature(sig) = packet {
                for key in cert.keys().with_policy(&policy, None) {
                    if key.for_signing() && sig.verify_message(key.key(), text.as_bytes()).is_ok() {
                        return true;
                    }
                }
            }
        }
        false
    }

    #[test]
    fn test_sign_with_unlocked_key() {
        let cert = generate("Release Key <release@example.com>", None);
        let signer = ReleaseSigner::new(vec![cert.clone()], vec!["release@example.com".to_string()]);
        let signature = signer.sign("Origin: test\n").unwrap();
        assert!(signature.starts_with("-----BEGIN PGP SIGNATURE-----"));
        assert!(verify(&cert, &signature, "Origin: test\n"));
        // tampered text does not verify
        assert!(!verify(&cert, &signature, "Origin: tampered\n"));
    }

    #[test]
    fn test_sign_with_passphrase() {
        let cert = generate("Release Key <release@example.com>", Some("secret"));
        let signer = ReleaseSigner::new(vec![cert.clone()], vec!["release@example.com".to_string()])
            .with_passphrases(vec![Some("secret".to_string())]);
        let signature = signer.sign("Origin: test\n").unwrap();
        assert!(verify(&cert, &signature, "Origin: test\n"));
    }

    #[test]
    fn test_multiple_keys_concatenate_in_order() {
        let first = generate("First <first@example.com>", None);
        let second = generate("Second <second@example.com>", None);
        let signer = ReleaseSigner::new(
            vec![first.clone(), second.clone()],
            vec!["first@example.com".to_string(), "second@example.com".to_string()],
        );
        let signature = signer.sign("Origin: test\n").unwrap();
        assert_eq!(signature.matches("-----BEGIN PGP SIGNATURE-----").count(), 2);
        assert!(verify(&first, &signature, "Origin: test\n"));
    }

    #[test]
    fn test_unknown_key_is_fatal() {
        let signer = ReleaseSigner::new(Vec::new(), vec!["nobody@example.com".to_string()]);
        assert!(matches!(
            signer.sign("Origin: test\n"),
            Err(Error::UnknownSigningKey(_))
        ));
    }

    #[test]
    fn test_lookup_by_fingerprint() {
        let cert = generate("Key <key@example.com>", None);
        let fingerprint = cert.fingerprint().to_hex().to_lowercase();
        let signer = ReleaseSigner::new(vec![cert.clone()], vec![fingerprint]);
        assert!(signer.sign("Origin: test\n").is_ok());
    }

    struct FlakyPrompt {
        calls: Mutex<usize>,
    }

    impl PassphraseSource for FlakyPrompt {
        fn passphrase(&self, _key_id: &str, _attempt: usize) -> Result<String> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls == 1 {
                Ok("fat-fingered".to_string())
            } else {
                Ok("secret".to_string())
            }
        }
    }

    #[test]
    fn test_flaky_prompt_is_retried() {
        let cert = generate("Key <key@example.com>", Some("secret"));
        let signer = ReleaseSigner::new(vec![cert.clone()], vec!["key@example.com".to_string()])
            .with_prompt(Box::new(FlakyPrompt {
                calls: Mutex::new(0),
            }));
        let signature = signer.sign("Origin: test\n").unwrap();
        assert!(verify(&cert, &signature, "Origin: test\n"));
    }

    struct WrongPrompt;

    impl PassphraseSource for WrongPrompt {
        fn passphrase(&self, _key_id: &str, _attempt: usize) -> Result<String> {
            Ok("wrong".to_string())
        }
    }

    #[test]
    fn test_unlock_failure_is_bounded() {
        let cert = generate("Key <key@example.com>", Some("secret"));
        let signer = ReleaseSigner::new(vec![cert], vec!["key@example.com".to_string()])
            .with_prompt(Box::new(WrongPrompt));
        assert!(matches!(
            signer.sign("Origin: test\n"),
            Err(Error::Signing(_))
        ));
    }
}
