use rusqlite::{params, Connection, OptionalExtension};

use crate::api::auth::StoredAuthState;
use crate::error::{Error, Result};
use crate::persistent::StoredClient;
use crate::settings::ClientConfig;
use chrono::{DateTime, Utc};

/// 客户端状态持久化：单行表，同时保存配置 JSON 与令牌字段。
/// 桌面端需要跨多次启动复用 token，所以统一走 sqlite。
pub(crate) const CLIENT_TABLE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS client_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    config_json TEXT NOT NULL,
    code TEXT,
    access_token TEXT,
    refresh_token TEXT,
    expires_at_millis INTEGER,
    updated_at_millis INTEGER NOT NULL
);";

/// `client_state` 表的行结构。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    pub config_json: String,
    pub code: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at_millis: Option<i64>,
    pub updated_at_millis: i64,
}

impl ClientRecord {
    pub(crate) fn from_stored(client: &StoredClient, updated_at_millis: i64) -> Result<Self> {
        Ok(ClientRecord {
            config_json: client.config.to_json()?,
            code: client.auth.code.clone(),
            access_token: client.auth.access_token.clone(),
            refresh_token: client.auth.refresh_token.clone(),
            expires_at_millis: client.auth.expires_at.map(|at| at.timestamp_millis()),
            updated_at_millis,
        })
    }

    pub(crate) fn into_stored(self) -> Result<StoredClient> {
        let expires_at = match self.expires_at_millis {
            Some(millis) => Some(DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(
                || Error::Storage(format!("stored expiry {millis} is out of range")),
            )?),
            None => None,
        };
        Ok(StoredClient {
            config: ClientConfig::from_json(&self.config_json)?,
            auth: StoredAuthState {
                code: self.code,
                access_token: self.access_token,
                refresh_token: self.refresh_token,
                expires_at,
            },
        })
    }
}

/// 写入或覆盖唯一的一行（id = 1）。
pub(crate) fn upsert_client_record(conn: &Connection, record: &ClientRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO client_state (
            id,
            config_json,
            code,
            access_token,
            refresh_token,
            expires_at_millis,
            updated_at_millis
        )
        VALUES (1, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            config_json = excluded.config_json,
            code = excluded.code,
            access_token = excluded.access_token,
            refresh_token = excluded.refresh_token,
            expires_at_millis = excluded.expires_at_millis,
            updated_at_millis = excluded.updated_at_millis",
        params![
            record.config_json,
            record.code,
            record.access_token,
            record.refresh_token,
            record.expires_at_millis,
            record.updated_at_millis,
        ],
    )
    .map_err(|e| Error::Storage(format!("failed to upsert client state: {e}")))?;
    Ok(())
}

/// 读取已保存的状态，表为空时返回 `None`。
pub(crate) fn load_client_record(conn: &Connection) -> Result<Option<ClientRecord>> {
    conn.query_row(
        "SELECT
            config_json,
            code,
            access_token,
            refresh_token,
            expires_at_millis,
            updated_at_millis
        FROM client_state
        WHERE id = 1",
        [],
        |row| {
            Ok(ClientRecord {
                config_json: row.get(0)?,
                code: row.get(1)?,
                access_token: row.get(2)?,
                refresh_token: row.get(3)?,
                expires_at_millis: row.get(4)?,
                updated_at_millis: row.get(5)?,
            })
        },
    )
    .optional()
    .map_err(|e| Error::Storage(format!("failed to read client state: {e}")))
}

pub(crate) fn clear_client_record(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM client_state WHERE id = 1", [])
        .map_err(|e| Error::Storage(format!("failed to clear client state: {e}")))?;
    Ok(())
}
