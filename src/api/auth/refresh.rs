use super::auth::AuthorizationManager;
use crate::api::client::{HttpMethod, HttpRequest, RequestData};
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, warn};

/// 令牌请求中只要出现就必须非空的字段。
const REQUIRED_KEYS: [&str; 5] = [
    "client_id",
    "client_secret",
    "code",
    "refresh_token",
    "grant_type",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    AuthorizationCode,
    RefreshToken,
}

impl Grant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grant::AuthorizationCode => "authorization_code",
            Grant::RefreshToken => "refresh_token",
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token_type: Option<String>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
}

impl AuthorizationManager {
    /// 下一次换取 token 使用的授权方式：持有 refresh token 时总是优先使用它。
    pub fn next_grant(&self) -> Grant {
        match self.state.refresh_token.as_deref() {
            Some(token) if !token.is_empty() => Grant::RefreshToken,
            _ => Grant::AuthorizationCode,
        }
    }

    /// 用授权码或 refresh token 换取新的 access token，返回实际授予的 scope。
    /// - `check_scope` 为真时，授予的 scope 与配置不一致会返回错误，但新 token 仍会保存。
    /// - 成功后调用已注册的回调，便于调用方持久化。
    ///
    /// # Panics
    ///
    /// 令牌端点返回的 `token_type` 不是 `bearer` 时 panic，说明服务端协议版本不兼容。
    #[instrument(skip(self), fields(client_id = %self.credentials.client_id))]
    pub fn exchange_token(&mut self, check_scope: bool) -> Result<Vec<String>> {
        let form = self.token_request_form()?;

        let response: TokenResponse = self
            .transport
            .execute(HttpRequest::new(HttpMethod::Post, self.auth_url_token.clone()).data(form))?
            .parse()?;

        assert_eq!(
            response.token_type.as_deref(),
            Some("bearer"),
            "token endpoint returned an unsupported token_type"
        );

        if let Some(access_token) = response.access_token {
            self.state.access_token = Some(access_token);
        }
        if let Some(refresh_token) = response.refresh_token {
            self.state.refresh_token = Some(refresh_token);
        }
        self.state.expires_at = response.expires_in.and_then(expiry_after);

        let granted: Vec<String> = response
            .scope
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        info!(expires_at = ?self.state.expires_at, "obtained access token");

        if check_scope {
            let requested: BTreeSet<&str> =
                self.credentials.scope.iter().map(String::as_str).collect();
            let received: BTreeSet<&str> = granted.iter().map(String::as_str).collect();
            if requested != received {
                return Err(Error::Authentication(format!(
                    "granted scope ({}) doesn't match requested one ({})",
                    granted.join(", "),
                    self.credentials.scope.join(", ")
                )));
            }
        }

        if let Some(hook) = self.exchange_hook.as_mut() {
            hook(&self.state)?;
        }
        Ok(granted)
    }

    /// 构建令牌请求表单，并在发送前检查必填字段。
    fn token_request_form(&self) -> Result<RequestData> {
        let credentials = &self.credentials;
        let mut form = RequestData::new();
        form.insert("client_id".to_string(), credentials.client_id.clone());
        form.insert(
            "client_secret".to_string(),
            credentials.client_secret.clone(),
        );
        form.insert("redirect_uri".to_string(), credentials.redirect_uri.clone());

        let grant = self.next_grant();
        match grant {
            Grant::AuthorizationCode => {
                debug!("requesting new access token through authorization_code grant");
                form.insert(
                    "code".to_string(),
                    self.state.code.clone().unwrap_or_default(),
                );
            }
            Grant::RefreshToken => {
                if credentials.is_mobile_redirect() {
                    form.remove("client_secret");
                }
                debug!("refreshing access token");
                form.insert(
                    "refresh_token".to_string(),
                    self.state.refresh_token.clone().unwrap_or_default(),
                );
            }
        }
        form.insert("grant_type".to_string(), grant.as_str().to_string());

        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| form.get(*key).is_some_and(|value| value.is_empty()))
            .collect();
        if !missing.is_empty() {
            return Err(Error::Authentication(format!(
                "insufficient authentication data provided (missing keys: {})",
                missing.join(", ")
            )));
        }
        Ok(form)
    }
}

/// 计算从现在起 `seconds` 秒后的过期时间；超出范围时返回 `None`。
fn expiry_after(seconds: i64) -> Option<DateTime<Utc>> {
    let expiry = Duration::try_seconds(seconds).and_then(|ttl| Utc::now().checked_add_signed(ttl));
    if expiry.is_none() {
        warn!(expires_in = seconds, "token lifetime out of range, expiry left unknown");
    }
    expiry
}
