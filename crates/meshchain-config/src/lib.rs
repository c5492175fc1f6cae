//! Typed, read-only configuration snapshot for a node process (ambient to
//! the distilled design, required to boot `meshchain-node` at all): DB
//! endpoint/credentials, peer list, the two API ports and credential pairs,
//! logging sink, and the `password_encryption` flag that picks whether
//! passwords are read plaintext or decrypted against `config/<env>.key`.

mod cipher;
mod loader;
mod model;

pub use cipher::CipherError;
pub use loader::{load, ConfigError};
pub use model::{
    ApiConfig, ApiCredentials, AuthScheme, LoggingConfig, LoggingSink, MeshConfig, StoreConfig
};
