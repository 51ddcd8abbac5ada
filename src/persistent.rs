use crate::api::auth::StoredAuthState;
use crate::api::client::Transport;
use crate::api::drive::DriveClient;
use crate::error::{Error, Result};
use crate::settings::ClientConfig;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// 客户端恢复上次运行状态所需的全部数据。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredClient {
    pub config: ClientConfig,
    pub auth: StoredAuthState,
}

/// [`StoredClient`] 的持久化接口。
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<Option<StoredClient>>;
    fn sync(&self, client: &StoredClient) -> Result<()>;
}

/// 只在进程内有效的内存存储。
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    slot: Mutex<Option<StoredClient>>,
}

impl MemoryConfigStore {
    pub fn new(initial: Option<StoredClient>) -> Self {
        MemoryConfigStore {
            slot: Mutex::new(initial),
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<Option<StoredClient>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| Error::Storage("memory store lock poisoned".to_string()))?;
        Ok(slot.clone())
    }

    fn sync(&self, client: &StoredClient) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| Error::Storage("memory store lock poisoned".to_string()))?;
        *slot = Some(client.clone());
        Ok(())
    }
}

/// 自动持久化的 [`DriveClient`]：每次换取 token 后以及 drop 时把配置与令牌写回存储。
pub struct PersistentDriveClient {
    client: DriveClient,
    store: Arc<dyn ConfigStore>,
}

impl PersistentDriveClient {
    /// 从存储中恢复客户端，存储为空时使用 `initial` 配置。
    pub fn open(
        store: Arc<dyn ConfigStore>,
        transport: Transport,
        initial: ClientConfig,
    ) -> Result<Self> {
        let stored = match store.load()? {
            Some(stored) => {
                debug!("restored client state from store");
                stored
            }
            None => StoredClient {
                config: initial,
                auth: StoredAuthState::default(),
            },
        };

        let mut client =
            DriveClient::with_transport(stored.config, transport)?.with_state(stored.auth);
        let effective = client.config().clone();
        let hook_store = Arc::clone(&store);
        client.auth_mut().set_exchange_hook(Box::new(move |auth: &StoredAuthState| {
            hook_store.sync(&StoredClient {
                config: effective.clone(),
                auth: auth.clone(),
            })
        }));

        // 自动生成的凭据需要立即落盘。
        store.sync(&StoredClient {
            config: client.config().clone(),
            auth: client.auth().snapshot(),
        })?;
        Ok(PersistentDriveClient { client, store })
    }

    /// 与 [`open`](Self::open) 相同，但使用真实的 HTTP 传输层。
    pub fn connect(store: Arc<dyn ConfigStore>, initial: ClientConfig) -> Result<Self> {
        let transport = Transport::reqwest(initial.request_timeout())?;
        Self::open(store, transport, initial)
    }

    pub fn snapshot(&self) -> StoredClient {
        StoredClient {
            config: self.client.config().clone(),
            auth: self.client.auth().snapshot(),
        }
    }

    /// 立即把当前状态写回存储。
    pub fn sync(&self) -> Result<()> {
        self.store.sync(&self.snapshot())
    }
}

impl Deref for PersistentDriveClient {
    type Target = DriveClient;

    fn deref(&self) -> &DriveClient {
        &self.client
    }
}

impl DerefMut for PersistentDriveClient {
    fn deref_mut(&mut self) -> &mut DriveClient {
        &mut self.client
    }
}

impl Drop for PersistentDriveClient {
    fn drop(&mut self) {
        if let Err(err) = self.sync() {
            warn!(error = %err, "failed to persist client state on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::RawResponse;
    use crate::testing::ScriptedBackend;
    use serde_json::json;

    fn token_response() -> RawResponse {
        RawResponse::json(
            200,
            &json!({
                "token_type": "bearer",
                "access_token": "at-new",
                "refresh_token": "rt-new",
                "expires_in": 3600,
                "scope": "wl.skydrive wl.skydrive_update wl.offline_access"
            }),
        )
    }

    #[test]
    fn test_open_empty_store_persists_generated_credentials() {
        let store = Arc::new(MemoryConfigStore::default());
        let client = PersistentDriveClient::open(
            store.clone(),
            Transport::new(ScriptedBackend::new(Vec::new())),
            ClientConfig::default(),
        )
        .unwrap();

        let saved = store.load().unwrap().unwrap();
        let client_id = saved.config.client_id.clone().unwrap();
        assert_eq!(client_id.len(), 16);
        assert_eq!(client.config().client_id.as_deref(), Some(client_id.as_str()));
    }

    #[test]
    fn test_open_restores_stored_tokens() {
        let store = Arc::new(MemoryConfigStore::new(Some(StoredClient {
            config: ClientConfig::new("client-1", "secret-1"),
            auth: StoredAuthState {
                access_token: Some("at-old".to_string()),
                refresh_token: Some("rt-old".to_string()),
                ..StoredAuthState::default()
            },
        })));

        let client = PersistentDriveClient::open(
            store,
            Transport::new(ScriptedBackend::new(Vec::new())),
            ClientConfig::default(),
        )
        .unwrap();

        assert_eq!(client.auth().access_token(), Some("at-old"));
        assert_eq!(client.config().client_id.as_deref(), Some("client-1"));
    }

    #[test]
    fn test_exchange_writes_tokens_back() {
        let store = Arc::new(MemoryConfigStore::default());
        let mut client = PersistentDriveClient::open(
            store.clone(),
            Transport::new(ScriptedBackend::new(vec![token_response()])),
            ClientConfig::new("client-1", "secret-1"),
        )
        .unwrap();

        client.auth_mut().set_authorization_code("code-1");
        client.auth_mut().exchange_token(true).unwrap();

        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.auth.access_token.as_deref(), Some("at-new"));
        assert_eq!(saved.auth.refresh_token.as_deref(), Some("rt-new"));
        assert!(saved.auth.expires_at.is_some());
    }

    /// 写入总是失败的存储，用于统计写入次数。
    #[derive(Default)]
    struct BrokenStore {
        attempts: Mutex<usize>,
    }

    impl ConfigStore for BrokenStore {
        fn load(&self) -> Result<Option<StoredClient>> {
            Ok(None)
        }

        fn sync(&self, _client: &StoredClient) -> Result<()> {
            *self.attempts.lock().unwrap() += 1;
            Err(Error::Storage("read-only database".to_string()))
        }
    }

    #[test]
    fn test_failed_open_writes_once() {
        let store = Arc::new(BrokenStore::default());
        let result = PersistentDriveClient::open(
            store.clone(),
            Transport::new(ScriptedBackend::new(Vec::new())),
            ClientConfig::new("client-1", "secret-1"),
        );

        assert!(matches!(result, Err(Error::Storage(_))));
        assert_eq!(*store.attempts.lock().unwrap(), 1);
    }

    #[test]
    fn test_drop_syncs_latest_state() {
        let store = Arc::new(MemoryConfigStore::default());
        {
            let mut client = PersistentDriveClient::open(
                store.clone(),
                Transport::new(ScriptedBackend::new(Vec::new())),
                ClientConfig::new("client-1", "secret-1"),
            )
            .unwrap();
            client.auth_mut().set_authorization_code("code-9");
        }

        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.auth.code.as_deref(), Some("code-9"));
    }
}
