//! Router fixtures backed by memory stores, a manual clock and fixed signing keys.

use authsvc::api::{AuthConfig, AuthState};
use authsvc::keys::KeyManager;
use authsvc::store::{ManualClock, MemoryStore};
use authsvc::users::{MemoryUserRepository, UserRepository};
use rsa::{pkcs8::DecodePrivateKey, RsaPrivateKey};
use std::{error::Error, sync::Arc};

pub type TestResult<T = ()> = Result<T, Box<dyn Error>>;

const TEST_PRIVATE_KEY_PEM: &str = include_str!("../fixtures/signing_key.pem");
const OTHER_PRIVATE_KEY_PEM: &str = include_str!("../fixtures/other_signing_key.pem");

fn manager(pem: &str) -> TestResult<KeyManager> {
    let key = RsaPrivateKey::from_pkcs8_pem(pem)?;
    Ok(KeyManager::from_private_key(key)?)
}

/// Key manager over a key the harness never trusts.
pub fn other_key_manager() -> TestResult<KeyManager> {
    manager(OTHER_PRIVATE_KEY_PEM)
}

pub struct TestHarness {
    pub state: Arc<AuthState>,
    pub clock: Arc<ManualClock>,
}

pub fn harness() -> TestResult<TestHarness> {
    harness_with_users(Arc::new(MemoryUserRepository::new()))
}

pub fn harness_with_users(users: Arc<dyn UserRepository>) -> TestResult<TestHarness> {
    let clock = Arc::new(ManualClock::new());
    let keys = Arc::new(manager(TEST_PRIVATE_KEY_PEM)?);
    let kv = Arc::new(MemoryStore::with_clock(clock.clone()));
    let state = AuthState::new(AuthConfig::default(), keys, kv.clone(), kv, users);

    Ok(TestHarness {
        state: Arc::new(state),
        clock,
    })
}
