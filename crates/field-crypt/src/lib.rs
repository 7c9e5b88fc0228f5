//! Transparent field-level encryption for persistence lifecycle hooks.
//!
//! Before a flush writes data, every field a type marks as encrypted is
//! replaced by ciphertext tagged with [`common::ENCRYPTION_MARKER`]. After the
//! flush, and after loads, those fields are decrypted back to plaintext in
//! place. Hosts wire [`EncryptSubscriber`] to their framework through the
//! traits in [`subscriber::port`].
//!
//! ```no_run
//! use field_crypt::{Config, EncryptSubscriber};
//!
//! # fn main() -> anyhow::Result<()> {
//! let cfg = Config::from_env()?;
//! field_crypt::telemetry::init(&cfg.log_level)?;
//! let subscriber = EncryptSubscriber::from_config(&cfg);
//! # let _ = subscriber;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crypto;
pub mod key;
pub mod memo;
pub mod schema;
pub mod subscriber;
pub mod telemetry;
pub mod walker;

pub use common::{CipherError, ConfigurationError, LifecycleError, ENCRYPTION_MARKER};
pub use crate::config::Config;
pub use crate::crypto::{AesGcmSivCipher, ChaChaCipher, Cipher, CipherKind, SharedCipher};
pub use crate::memo::FieldMemo;
pub use crate::schema::{
    ClassificationCache, Encryptable, EntitySchema, FieldDecl, FieldMarker, FieldSlot,
};
pub use crate::subscriber::{
    EncryptSubscriber, IdentityMap, InstanceKey, LifecycleListener, ManagedEntities, UnitOfWork,
};
pub use crate::walker::{Direction, GraphWalker};
