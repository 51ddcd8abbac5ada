//! SkyDrive REST API（Live Connect v5.0）的阻塞式客户端。
//!
//! - [`AuthorizationManager`] 负责 OAuth2 授权流程。
//! - [`DriveClient`] 发送带认证的请求，token 过期时每次调用最多刷新重试一次。
//! - [`PersistentDriveClient`] 通过 [`ConfigStore`] 在多次运行之间保存令牌。
//!
//! ```no_run
//! use skydrive_client::{ClientConfig, DriveClient, ListOptions, ROOT_ID};
//!
//! # fn main() -> skydrive_client::Result<()> {
//! let mut client = DriveClient::new(ClientConfig::new("my-client-id", "my-secret"))?;
//! println!("visit {}", client.auth().build_authorization_url(None)?);
//! # let redirect = String::new();
//! client.auth_mut().consume_redirect(&redirect)?;
//! client.auth_mut().exchange_token(true)?;
//! let listing = client.listdir(ROOT_ID, &ListOptions::default())?;
//! println!("{} objects in the root folder", listing.len());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod db;
pub mod error;
pub mod persistent;
pub mod settings;

#[cfg(test)]
pub(crate) mod testing;

pub use api::auth::{AuthorizationManager, AuthorizationState, Credentials, StoredAuthState};
pub use api::client::{HttpBackend, HttpMethod, PreparedBody, PreparedRequest, RawResponse, Transport};
pub use api::drive::{
    ApiCall, DriveClient, ListOptions, Listing, ObjectType, Quota, RemoteObject, ResolveOptions,
    Resolved, ROOT_ID,
};
pub use db::SqliteConfigStore;
pub use error::{Error, ErrorKind, Result};
pub use persistent::{ConfigStore, MemoryConfigStore, PersistentDriveClient, StoredClient};
pub use settings::ClientConfig;
