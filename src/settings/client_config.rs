use crate::error::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 浏览器授权页。
pub const AUTH_URL_USER: &str = "https://login.live.com/oauth20_authorize.srf";
/// 令牌端点。
pub const AUTH_URL_TOKEN: &str = "https://login.live.com/oauth20_token.srf";
/// 资源 API 根地址。
pub const API_URL_BASE: &str = "https://apis.live.net/v5.0/";

/// 只对注册为 "mobile" 的应用有效的回调地址。
/// 使用它刷新 token 时不能携带 client secret。
pub const REDIRECT_URI_MOBILE: &str = "https://login.live.com/oauth20_desktop.srf";

/// 默认申请的权限：读写 SkyDrive 以及离线访问。
pub const DEFAULT_SCOPE: [&str; 3] = ["wl.skydrive", "wl.skydrive_update", "wl.offline_access"];

/// 自动生成的 client id / secret 的长度。
const GENERATED_CREDENTIAL_LEN: usize = 16;

/// 客户端的全部可配置项。
/// 解析序列化的配置时，出现未知字段会直接报错。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scope: Vec<String>,
    pub auth_url_user: String,
    pub auth_url_token: String,
    pub api_url_base: String,
    /// listdir / 路径解析默认返回完整元数据而不是 id。
    pub return_objects: bool,
    pub request_timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            client_id: None,
            client_secret: None,
            redirect_uri: REDIRECT_URI_MOBILE.to_string(),
            scope: DEFAULT_SCOPE.iter().map(|s| s.to_string()).collect(),
            auth_url_user: AUTH_URL_USER.to_string(),
            auth_url_token: AUTH_URL_TOKEN.to_string(),
            api_url_base: API_URL_BASE.to_string(),
            return_objects: false,
            request_timeout_secs: None,
        }
    }
}

impl ClientConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        ClientConfig {
            client_id: Some(client_id.into()),
            client_secret: Some(client_secret.into()),
            ..ClientConfig::default()
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::Config(format!("failed to parse config: {e}")))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {e}")))
    }

    /// 为缺失的 client id / secret 生成随机十六进制串，已有的值保持不变。
    pub fn ensure_credentials(&mut self) {
        if self.client_id.as_deref().map_or(true, str::is_empty) {
            self.client_id = Some(random_hex(GENERATED_CREDENTIAL_LEN));
        }
        if self.client_secret.as_deref().map_or(true, str::is_empty) {
            self.client_secret = Some(random_hex(GENERATED_CREDENTIAL_LEN));
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// 生成长度恰好为 `len` 的小写十六进制随机串。
pub fn random_hex(len: usize) -> String {
    let mut bytes = vec![0_u8; len.div_ceil(2)];
    rand::thread_rng().fill(&mut bytes[..]);
    let mut hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    hex.truncate(len);
    hex
}
