//! Fixed signing keys for unit tests.
//!
//! Generating a 2048-bit key takes far longer than everything else a test does.

use rsa::{pkcs8::DecodePrivateKey, RsaPrivateKey};

use crate::keys::KeyManager;

const TEST_PRIVATE_KEY_PEM: &str = include_str!("../tests/fixtures/signing_key.pem");
const OTHER_PRIVATE_KEY_PEM: &str = include_str!("../tests/fixtures/other_signing_key.pem");

fn manager(pem: &str) -> KeyManager {
    let key = RsaPrivateKey::from_pkcs8_pem(pem).expect("test key must parse");
    KeyManager::from_private_key(key).expect("test key manager")
}

/// Key manager over the fixed test key.
pub fn key_manager() -> KeyManager {
    manager(TEST_PRIVATE_KEY_PEM)
}

/// Key manager over a second, unrelated key.
pub fn other_key_manager() -> KeyManager {
    manager(OTHER_PRIVATE_KEY_PEM)
}
