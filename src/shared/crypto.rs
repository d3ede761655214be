//! Cryptographic material owned by this tracker instance.
//!
//! The instance seed is a random 32-byte key generated lazily, once per
//! process. It backs connection-ID signing when no `private_key` is
//! configured, which keeps a single instance working out of the box.
//! Cookies minted with it die with the process and cannot be validated by
//! other instances, so deployments running several instances behind one
//! name must configure a shared key instead.
use std::sync::OnceLock;

use rand::Rng;

/// A 32-byte random seed.
pub type Seed = [u8; 32];

static INSTANCE_SEED: OnceLock<Seed> = OnceLock::new();

/// The ephemeral seed of this tracker instance. Stable for the lifetime of
/// the process.
#[must_use]
pub fn instance_seed() -> &'static Seed {
    INSTANCE_SEED.get_or_init(|| rand::thread_rng().gen())
}
