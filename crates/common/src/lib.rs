//! Types shared by the `field-crypt` core and host integration layers.
//!
//! Nothing in here depends on a cipher backend: hosts can match on errors and
//! recognise marked ciphertext without pulling in the crypto stack.

pub mod error;
pub mod marker;

pub use error::{CipherError, ConfigurationError, LifecycleError};
pub use marker::ENCRYPTION_MARKER;
