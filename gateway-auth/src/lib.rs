//! Credential extraction, key store, and the auth/rate-limit/quota
//! middleware (`§4.3`, `§4.4`).

pub mod credential;
pub mod middleware;
pub mod store;

pub use credential::{extract_credential, recognize_provider_key};
pub use middleware::{enforce, AuthContext, AuthState};
pub use store::KeyStore;
