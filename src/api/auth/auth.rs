use crate::api::client::Transport;
use crate::error::{Error, Result};
use crate::settings::{ClientConfig, REDIRECT_URI_MOBILE};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;
use url::{form_urlencoded, Url};

/// 在 Live Connect 注册的应用凭据。
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scope: Vec<String>,
}

impl Credentials {
    /// 从配置中读取凭据，缺失的 id / secret 会先随机生成。
    pub fn from_config(config: &mut ClientConfig) -> Self {
        config.ensure_credentials();
        Credentials {
            client_id: config.client_id.clone().unwrap_or_default(),
            client_secret: config.client_secret.clone().unwrap_or_default(),
            redirect_uri: config.redirect_uri.clone(),
            scope: config.scope.clone(),
        }
    }

    /// 桌面端回调地址只适用于标记为 "mobile" 的应用，这类应用刷新 token 时不带 client secret。
    pub fn is_mobile_redirect(&self) -> bool {
        self.redirect_uri == REDIRECT_URI_MOBILE
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .finish()
    }
}

/// 需要跨多次启动保存的令牌字段。
/// 授权码与 token 可以同时存在，换取 token 时 refresh token 优先。
#[derive(Clone, Default, PartialEq, Eq)]
pub struct StoredAuthState {
    pub code: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for StoredAuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredAuthState")
            .field("code", &self.code.as_ref().map(|_| "[REDACTED]"))
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// OAuth2 流程当前所处的阶段。
///
/// ```text
/// Unauthenticated -> HasAuthorizationCode -> HasTokens
///                                              ^   |
///                                              +---+ refresh
/// ```
#[derive(Clone, PartialEq, Eq)]
pub enum AuthorizationState {
    Unauthenticated,
    HasAuthorizationCode(String),
    HasTokens {
        access_token: Option<String>,
        refresh_token: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    },
}

impl AuthorizationState {
    pub fn has_tokens(&self) -> bool {
        matches!(self, AuthorizationState::HasTokens { .. })
    }
}

impl From<&StoredAuthState> for AuthorizationState {
    fn from(state: &StoredAuthState) -> Self {
        let held = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        if held(&state.access_token) || held(&state.refresh_token) {
            AuthorizationState::HasTokens {
                access_token: state.access_token.clone(),
                refresh_token: state.refresh_token.clone(),
                expires_at: state.expires_at,
            }
        } else if let Some(code) = state.code.clone().filter(|c| !c.is_empty()) {
            AuthorizationState::HasAuthorizationCode(code)
        } else {
            AuthorizationState::Unauthenticated
        }
    }
}

impl fmt::Debug for AuthorizationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorizationState::Unauthenticated => write!(f, "Unauthenticated"),
            AuthorizationState::HasAuthorizationCode(_) => {
                write!(f, "HasAuthorizationCode([REDACTED])")
            }
            AuthorizationState::HasTokens {
                refresh_token,
                expires_at,
                ..
            } => f
                .debug_struct("HasTokens")
                .field("access_token", &"[REDACTED]")
                .field("has_refresh_token", &refresh_token.is_some())
                .field("expires_at", expires_at)
                .finish(),
        }
    }
}

/// 每次成功换取 token 后回调，参数为最新的令牌状态。
pub type ExchangeHook = Box<dyn FnMut(&StoredAuthState) -> Result<()> + Send>;

/// 负责单个账户的 OAuth2 凭据与令牌状态。
pub struct AuthorizationManager {
    pub(super) credentials: Credentials,
    pub(super) auth_url_user: String,
    pub(super) auth_url_token: String,
    pub(super) transport: Transport,
    pub(super) state: StoredAuthState,
    pub(super) exchange_hook: Option<ExchangeHook>,
}

impl AuthorizationManager {
    pub fn new(config: &mut ClientConfig, transport: Transport) -> Self {
        AuthorizationManager {
            credentials: Credentials::from_config(config),
            auth_url_user: config.auth_url_user.clone(),
            auth_url_token: config.auth_url_token.clone(),
            transport,
            state: StoredAuthState::default(),
            exchange_hook: None,
        }
    }

    /// 注入已有的令牌状态，通常来自持久化存储。
    pub fn with_state(mut self, state: StoredAuthState) -> Self {
        self.state = state;
        self
    }

    pub fn set_exchange_hook(&mut self, hook: ExchangeHook) {
        self.exchange_hook = Some(hook);
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn state(&self) -> AuthorizationState {
        AuthorizationState::from(&self.state)
    }

    pub fn snapshot(&self) -> StoredAuthState {
        self.state.clone()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.state.access_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.state.refresh_token.as_deref()
    }

    /// `None` 表示过期时间未知，token 可能仍然有效。
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.state.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.state.expires_at.is_some_and(|at| Utc::now() >= at)
    }

    pub fn set_authorization_code(&mut self, code: impl Into<String>) {
        self.state.code = Some(code.into());
    }

    /// 生成浏览器授权页地址，未指定 scope 时使用配置中的 scope。
    pub fn build_authorization_url(&self, scope: Option<&[String]>) -> Result<String> {
        let scope = scope.unwrap_or(self.credentials.scope.as_slice()).join(" ");
        let mut url = Url::parse(&self.auth_url_user)
            .map_err(|e| Error::Config(format!("invalid authorization endpoint: {e}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.credentials.client_id)
            .append_pair("scope", &scope)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.credentials.redirect_uri);
        Ok(url.into())
    }

    /// 从授权页回调的 URL 中取出授权码。
    /// 查询串与 fragment 都会读取，两者同名时以 fragment 为准。
    pub fn consume_redirect(&mut self, redirect_url: &str) -> Result<String> {
        let url = Url::parse(redirect_url)
            .map_err(|e| Error::Authentication(format!("invalid redirect URL: {e}")))?;

        let mut params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        if let Some(fragment) = url.fragment() {
            params.extend(form_urlencoded::parse(fragment.as_bytes()).into_owned());
        }

        if let Some(error) = params.get("error").filter(|e| !e.is_empty()) {
            let message = match params.get("error_description") {
                Some(description) => format!("{error} :: {description}"),
                None => error.clone(),
            };
            return Err(Error::Authentication(message));
        }

        let code = params.remove("code").ok_or_else(|| {
            Error::Authentication("redirect URL carries no authorization code".to_string())
        })?;
        debug!("received authorization code from redirect");
        self.state.code = Some(code.clone());
        Ok(code)
    }
}
