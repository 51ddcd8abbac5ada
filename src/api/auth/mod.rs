#[allow(clippy::module_inception)]
mod auth;
mod refresh;

pub use auth::{
    AuthorizationManager, AuthorizationState, Credentials, ExchangeHook, StoredAuthState,
};
pub use refresh::Grant;
