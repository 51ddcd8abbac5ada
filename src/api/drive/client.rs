use crate::api::auth::{AuthorizationManager, StoredAuthState};
use crate::api::client::{
    FilePart, HttpMethod, HttpRequest, Payload, RequestData, Transport,
};
use crate::error::{Error, ErrorKind, Result};
use crate::settings::ClientConfig;
use std::collections::{BTreeMap, HashMap};
use tracing::{instrument, warn};
use url::Url;

/// 查询参数中携带 token 的键名。
const ACCESS_TOKEN_KEY: &str = "access_token";

/// 对资源 API 的一次逻辑调用，由 [`DriveClient::call`] 负责补上 token 并发送。
#[derive(Debug, Clone)]
pub struct ApiCall {
    pub path: String,
    /// 值为 `None` 的参数默认会被过滤掉。
    pub query: Vec<(String, Option<String>)>,
    pub method: HttpMethod,
    pub data: Option<RequestData>,
    pub files: Vec<FilePart>,
    pub headers: BTreeMap<String, String>,
    /// 调用方追加的状态码映射；401 始终映射为认证错误。
    pub raise_for: HashMap<u16, ErrorKind>,
    pub raw: bool,
    /// 通过 `Authorization: Bearer` 头传递 token，而不是查询参数。
    pub auth_header: bool,
    pub auto_refresh: bool,
    pub query_filter: bool,
    /// 允许空字符串参数；access_token 仍然必须非空。
    pub allow_empty_values: bool,
}

impl ApiCall {
    pub fn new(path: impl Into<String>) -> Self {
        ApiCall {
            path: path.into(),
            query: Vec::new(),
            method: HttpMethod::Get,
            data: None,
            files: Vec::new(),
            headers: BTreeMap::new(),
            raise_for: HashMap::new(),
            raw: false,
            auth_header: false,
            auto_refresh: true,
            query_filter: true,
            allow_empty_values: false,
        }
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn query<V: Into<String>>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.query.push((key.into(), value.map(Into::into)));
        self
    }

    pub fn data(mut self, data: RequestData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn file(mut self, part: FilePart) -> Self {
        self.files.push(part);
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn raise_for(mut self, status: u16, kind: ErrorKind) -> Self {
        self.raise_for.insert(status, kind);
        self
    }

    pub fn raw(mut self) -> Self {
        self.raw = true;
        self
    }

    pub fn auth_header(mut self) -> Self {
        self.auth_header = true;
        self
    }

    pub fn auto_refresh(mut self, enabled: bool) -> Self {
        self.auto_refresh = enabled;
        self
    }

    pub fn query_filter(mut self, enabled: bool) -> Self {
        self.query_filter = enabled;
        self
    }

    pub fn allow_empty_values(mut self) -> Self {
        self.allow_empty_values = true;
        self
    }
}

/// 去掉没有值的参数；空字符串也算值，会被保留。
pub fn filter_query(query: Vec<(String, Option<String>)>) -> Vec<(String, Option<String>)> {
    query.into_iter().filter(|(_, v)| v.is_some()).collect()
}

/// SkyDrive 资源 API 的认证客户端。
/// 每次调用都会带上当前 access token；遇到 401 时刷新一次 token 并重试一次，
/// 第二次失败直接返回给调用方。
pub struct DriveClient {
    pub(crate) auth: AuthorizationManager,
    pub(crate) transport: Transport,
    pub(crate) api_url_base: Url,
    pub(crate) return_objects: bool,
    config: ClientConfig,
}

impl DriveClient {
    /// 使用 reqwest 连接真实服务的客户端。
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = Transport::reqwest(config.request_timeout())?;
        Self::with_transport(config, transport)
    }

    /// 使用指定传输层构建客户端，测试中可注入假的后端。
    pub fn with_transport(mut config: ClientConfig, transport: Transport) -> Result<Self> {
        let auth = AuthorizationManager::new(&mut config, transport.clone());

        let mut base = config.api_url_base.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let api_url_base = Url::parse(&base)
            .map_err(|e| Error::Config(format!("invalid API base URL {base:?}: {e}")))?;

        Ok(DriveClient {
            auth,
            transport,
            api_url_base,
            return_objects: config.return_objects,
            config,
        })
    }

    pub fn with_state(mut self, state: StoredAuthState) -> Self {
        self.auth = self.auth.with_state(state);
        self
    }

    pub fn auth(&self) -> &AuthorizationManager {
        &self.auth
    }

    pub fn auth_mut(&mut self) -> &mut AuthorizationManager {
        &mut self.auth
    }

    /// 实际生效的配置，包括自动生成的 client id / secret。
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// 发送一次调用，401 时自动刷新 token 并重试一次。
    #[instrument(skip(self, call), fields(path = %call.path, method = call.method.as_str()))]
    pub fn call(&mut self, mut call: ApiCall) -> Result<Payload> {
        if call.query_filter {
            call.query = filter_query(std::mem::take(&mut call.query));
        }

        let request = self.build_request(&call)?;
        match self.transport.execute(request) {
            Err(err) if err.is_authentication() && call.auto_refresh => {
                warn!("access token rejected, refreshing it and retrying once");
                self.auth.exchange_token(true)?;
                let request = self.build_request(&call)?;
                self.transport.execute(request)
            }
            result => result,
        }
    }

    /// 根据调用与当前 token 组装 HTTP 请求，参数校验在发送前完成。
    fn build_request(&self, call: &ApiCall) -> Result<HttpRequest> {
        let token = self.auth.access_token().unwrap_or_default();

        let mut query = call.query.clone();
        if !call.auth_header && !query.iter().any(|(k, _)| k == ACCESS_TOKEN_KEY) {
            query.push((ACCESS_TOKEN_KEY.to_string(), Some(token.to_string())));
        }
        for (key, value) in &query {
            let empty = value.as_deref().map_or(true, str::is_empty);
            if empty && (!call.allow_empty_values || key == ACCESS_TOKEN_KEY) {
                return Err(empty_key_error(key, &call.path));
            }
        }

        let mut url = self.api_url_base.join(&call.path).map_err(|e| {
            Error::protocol(format!("invalid API path {:?}: {e}", call.path), None)
        })?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(
                query
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_deref().unwrap_or_default())),
            );
        }

        let mut request = HttpRequest::new(call.method, url.to_string()).raw(call.raw);
        request.headers = call.headers.clone();
        request.data = call.data.clone();
        request.files = call.files.clone();
        request.raise_for = call.raise_for.clone();
        request.raise_for.insert(401, ErrorKind::Authentication);

        if call.auth_header {
            if token.is_empty() {
                return Err(empty_key_error(ACCESS_TOKEN_KEY, &call.path));
            }
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        Ok(request)
    }
}

fn empty_key_error(key: &str, path: &str) -> Error {
    Error::protocol(
        format!("empty key {key:?} for API call (path: {path})"),
        None,
    )
}
