//! 单次请求的 HTTP 传输层。
//!
//! `Transport` 负责编码请求体、交给 [`HttpBackend`] 发送，并把响应转换为
//! [`Payload`] 或带类型的错误。这一层从不重试。

use crate::error::{Error, ErrorKind, Result};
use reqwest::{blocking::Client, redirect::Policy, Method};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::form_urlencoded;

/// 请求体中的键值数据。
pub type RequestData = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    /// API 用于复制对象的 WebDAV 风格方法。
    Copy,
    /// API 用于移动对象的 WebDAV 风格方法。
    Move,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Copy => "COPY",
            HttpMethod::Move => "MOVE",
        }
    }
}

/// multipart 上传中附带的文件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub data: Option<RequestData>,
    pub files: Vec<FilePart>,
    pub headers: BTreeMap<String, String>,
    pub raw: bool,
    /// 失败状态码对应的错误类型；未列出的状态码一律为 `Protocol`。
    pub raise_for: HashMap<u16, ErrorKind>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            data: None,
            files: Vec::new(),
            headers: BTreeMap::new(),
            raw: false,
            raise_for: HashMap::new(),
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
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

    pub fn raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    pub fn raise_for(mut self, status: u16, kind: ErrorKind) -> Self {
        self.raise_for.insert(status, kind);
        self
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers.keys().any(|k| k.eq_ignore_ascii_case(name))
    }
}

/// 编码完成、可以直接发送的请求体。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreparedBody {
    Empty,
    Bytes(Vec<u8>),
    Multipart {
        fields: Vec<(String, String)>,
        files: Vec<FilePart>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: PreparedBody,
}

impl PreparedRequest {
    /// 解码后的目标 URL 查询参数。
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        match url::Url::parse(&self.url) {
            Ok(url) => url.query_pairs().into_owned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn query_value(&self, key: &str) -> Option<String> {
        self.query_pairs()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 负责把一个已编码的请求真正发出去。
/// 只要服务端有响应（无论状态码）就返回 `Ok`，`Err` 只用于拿不到状态码的失败。
pub trait HttpBackend: Send + Sync {
    fn send(&self, request: PreparedRequest) -> Result<RawResponse>;
}

/// 成功请求解码后的响应。
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// 204 No Content.
    Empty,
    Json(serde_json::Value),
    Raw(Vec<u8>),
}

impl Payload {
    pub fn into_json(self) -> Result<serde_json::Value> {
        match self {
            Payload::Json(value) => Ok(value),
            Payload::Empty => Ok(serde_json::Value::Null),
            Payload::Raw(_) => Err(Error::protocol(
                "expected a JSON response but received raw content",
                None,
            )),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Payload::Raw(bytes) => bytes,
            Payload::Json(value) => value.to_string().into_bytes(),
            Payload::Empty => Vec::new(),
        }
    }

    pub fn parse<T: serde::de::DeserializeOwned>(self) -> Result<T> {
        let value = self.into_json()?;
        serde_json::from_value(value)
            .map_err(|e| Error::protocol(format!("failed to parse API response: {e}"), None))
    }
}

#[derive(Clone)]
pub struct Transport {
    backend: Arc<dyn HttpBackend>,
}

impl Transport {
    pub fn new(backend: Arc<dyn HttpBackend>) -> Self {
        Self { backend }
    }

    /// 基于阻塞式 reqwest 客户端的传输层。
    pub fn reqwest(timeout: Option<Duration>) -> Result<Self> {
        Ok(Self::new(Arc::new(ReqwestBackend::new(timeout)?)))
    }

    /// 发送请求并按状态码映射错误：204 返回空，`raw` 返回原始字节，其余按 JSON 解析。
    pub fn execute(&self, request: HttpRequest) -> Result<Payload> {
        let raw = request.raw;
        let raise_for = request.raise_for.clone();
        let method = request.method;
        let target = redact_url(&request.url);
        let prepared = prepare(request)?;

        debug!(method = method.as_str(), url = %target, "sending request");
        let response = self.backend.send(prepared)?;

        if !response.is_success() {
            let kind = raise_for
                .get(&response.status)
                .copied()
                .unwrap_or(ErrorKind::Protocol);
            let detail = String::from_utf8_lossy(&response.body);
            let message = format!(
                "{} {target} returned HTTP {}: {}",
                method.as_str(),
                response.status,
                detail.trim()
            );
            return Err(Error::from_kind(kind, message, Some(response.status)));
        }

        if response.status == 204 {
            return Ok(Payload::Empty);
        }
        if raw {
            return Ok(Payload::Raw(response.body));
        }
        let value = serde_json::from_slice(&response.body).map_err(|e| {
            Error::protocol(
                format!("failed to decode JSON from {target}: {e}"),
                Some(response.status),
            )
        })?;
        Ok(Payload::Json(value))
    }
}

/// POST 的数据编码为表单，其他方法编码为 JSON；带文件时使用 multipart。
fn prepare(request: HttpRequest) -> Result<PreparedRequest> {
    let mut headers = request.headers.clone();
    let has_content_type = request.has_header("Content-Type");
    let HttpRequest {
        method,
        url,
        data,
        files,
        ..
    } = request;

    let body = if !files.is_empty() {
        PreparedBody::Multipart {
            fields: data.unwrap_or_default().into_iter().collect(),
            files,
        }
    } else {
        match data {
            None => PreparedBody::Empty,
            Some(data) if method == HttpMethod::Post => {
                if !has_content_type {
                    headers.insert(
                        "Content-Type".to_string(),
                        "application/x-www-form-urlencoded".to_string(),
                    );
                }
                let encoded = form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(data.iter())
                    .finish();
                PreparedBody::Bytes(encoded.into_bytes())
            }
            Some(data) => {
                if !has_content_type {
                    headers.insert("Content-Type".to_string(), "application/json".to_string());
                }
                let encoded = serde_json::to_vec(&data).map_err(|e| {
                    Error::protocol(format!("failed to encode request body: {e}"), None)
                })?;
                PreparedBody::Bytes(encoded)
            }
        }
    };

    Ok(PreparedRequest {
        method,
        url,
        headers,
        body,
    })
}

/// 去掉查询串的 URL，可以安全地写入日志或错误信息。
pub(crate) fn redact_url(raw: &str) -> String {
    match raw.split_once('?') {
        Some((base, _)) => base.to_string(),
        None => raw.to_string(),
    }
}

/// 基于 reqwest 的真实后端，客户端只构建一次并复用。
pub struct ReqwestBackend {
    client: Client,
}

impl ReqwestBackend {
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::limited(10))
            .build()
            .map_err(|e| Error::protocol(format!("failed to build HTTP client: {e}"), None))?;
        Ok(Self { client })
    }
}

impl HttpBackend for ReqwestBackend {
    fn send(&self, request: PreparedRequest) -> Result<RawResponse> {
        let method = Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| Error::protocol(format!("invalid HTTP method: {e}"), None))?;
        let target = redact_url(&request.url);

        let mut builder = self.client.request(method, &request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        builder = match request.body {
            PreparedBody::Empty => builder,
            PreparedBody::Bytes(bytes) => builder.body(bytes),
            PreparedBody::Multipart { fields, files } => {
                let mut form = reqwest::blocking::multipart::Form::new();
                for (key, value) in fields {
                    form = form.text(key, value);
                }
                for part in files {
                    let file = reqwest::blocking::multipart::Part::bytes(part.content)
                        .file_name(part.file_name);
                    form = form.part(part.field, file);
                }
                builder.multipart(form)
            }
        };

        let response = builder
            .send()
            .map_err(|e| Error::protocol(format!("request to {target} failed: {e}"), None))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| {
                Error::protocol(
                    format!("failed to read response from {target}: {e}"),
                    Some(status),
                )
            })?
            .to_vec();
        Ok(RawResponse { status, body })
    }
}
