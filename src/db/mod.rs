//! 基于 SQLite 的 [`ConfigStore`](crate::persistent::ConfigStore) 实现。
//!
//! 单行保存序列化后的客户端配置与令牌状态，进程重启后可以直接恢复。

mod auth;

use crate::error::{Error, Result};
use crate::persistent::{ConfigStore, StoredClient};
use directories::ProjectDirs;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

pub use auth::ClientRecord;

const QUALIFIER: &str = "net";
const ORGANIZATION: &str = "SkyDrive";
const APPLICATION: &str = "skydrive-client";
const DB_FILE_NAME: &str = "client.db";

/// 每次操作都会打开新连接，建表语句在打开时执行。
#[derive(Debug, Clone)]
pub struct SqliteConfigStore {
    path: PathBuf,
}

impl SqliteConfigStore {
    /// 打开 `path` 处的数据库，不存在时自动创建。
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = SqliteConfigStore { path: path.into() };
        store.with_connection(|_| Ok(()))?;
        debug!(path = %store.path.display(), "opened client state database");
        Ok(store)
    }

    /// 打开平台用户数据目录下的默认数据库。
    pub fn open_default() -> Result<Self> {
        Self::open(default_location()?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn clear(&self) -> Result<()> {
        self.with_connection(auth::clear_client_record)
    }

    fn with_connection<T, F>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = open_connection(&self.path)?;
        operation(&conn)
    }
}

impl ConfigStore for SqliteConfigStore {
    fn load(&self) -> Result<Option<StoredClient>> {
        self.with_connection(auth::load_client_record)?
            .map(ClientRecord::into_stored)
            .transpose()
    }

    fn sync(&self, client: &StoredClient) -> Result<()> {
        let record = ClientRecord::from_stored(client, current_timestamp_millis())?;
        self.with_connection(|conn| auth::upsert_client_record(conn, &record))
    }
}

/// 默认数据库路径，位于平台的用户数据目录。
pub fn default_location() -> Result<PathBuf> {
    let dirs = ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION).ok_or_else(|| {
        Error::Storage("failed to resolve application data directory".to_string())
    })?;
    Ok(dirs.data_dir().join(DB_FILE_NAME))
}

/// 打开连接前确保目录存在，并执行建表。
fn open_connection(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| {
            Error::Storage(format!("failed to create database directory {dir:?}: {e}"))
        })?;
    }

    let conn = Connection::open(path)
        .map_err(|e| Error::Storage(format!("failed to open SQLite database: {e}")))?;
    apply_migrations(&conn)?;
    Ok(conn)
}

fn apply_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(auth::CLIENT_TABLE_SCHEMA)
        .map_err(|e| Error::Storage(format!("failed to initialize database schema: {e}")))?;
    Ok(())
}

fn current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or(0)
}
