//! 单元测试共用的脚本化 HTTP 后端。

use crate::api::client::{HttpBackend, PreparedRequest, RawResponse};
use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// 按固定队列返回响应，并记录收到的所有请求。
pub(crate) struct ScriptedBackend {
    responses: Mutex<VecDeque<std::result::Result<RawResponse, String>>>,
    requests: Mutex<Vec<PreparedRequest>>,
}

impl ScriptedBackend {
    pub(crate) fn new(responses: Vec<RawResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::from([Err(message.to_string())])),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn requests(&self) -> Vec<PreparedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn single_request(&self) -> PreparedRequest {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "expected exactly one request");
        requests.into_iter().next().unwrap()
    }

    /// URL 以 `prefix` 开头的请求。
    pub(crate) fn requests_to(&self, prefix: &str) -> Vec<PreparedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.starts_with(prefix))
            .collect()
    }
}

impl HttpBackend for ScriptedBackend {
    fn send(&self, request: PreparedRequest) -> Result<RawResponse> {
        self.requests.lock().unwrap().push(request);
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(Error::protocol(message, None)),
            None => Err(Error::protocol("no scripted response left", None)),
        }
    }
}

/// 把请求的表单体解码为键值对。
pub(crate) fn form_pairs(request: &PreparedRequest) -> Vec<(String, String)> {
    match &request.body {
        crate::api::client::PreparedBody::Bytes(bytes) => url::form_urlencoded::parse(bytes)
            .into_owned()
            .collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn form_value(request: &PreparedRequest, key: &str) -> Option<String> {
    form_pairs(request)
        .into_iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v)
}
