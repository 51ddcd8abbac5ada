use super::{
    client::{ApiCall, DriveClient},
    join_path,
};
use crate::error::Result;
use tracing::debug;

impl DriveClient {
    /// 下载文件内容：`GET <id>/content?download=true`，响应体按原始字节返回。
    pub fn get(&mut self, obj_id: &str) -> Result<Vec<u8>> {
        let call = ApiCall::new(join_path(obj_id, "content"))
            .query("download", Some("true"))
            .raw();
        let content = self.call(call)?.into_bytes();
        debug!(obj_id, bytes = content.len(), "downloaded object content");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::StoredAuthState;
    use crate::api::client::{RawResponse, Transport};
    use crate::settings::ClientConfig;
    use crate::testing::ScriptedBackend;

    #[test]
    fn test_get_returns_raw_bytes() {
        let backend = ScriptedBackend::new(vec![RawResponse::new(200, b"\x89PNG\r\n".to_vec())]);
        let mut client = DriveClient::with_transport(
            ClientConfig::new("client-1", "secret-1"),
            Transport::new(backend.clone()),
        )
        .unwrap()
        .with_state(StoredAuthState {
            access_token: Some("at".to_string()),
            ..StoredAuthState::default()
        });

        let content = client.get("file.123").unwrap();
        assert_eq!(content, b"\x89PNG\r\n".to_vec());

        let sent = backend.single_request();
        assert!(sent.url.contains("/file.123/content?"));
        assert_eq!(sent.query_value("download").as_deref(), Some("true"));
        assert_eq!(sent.query_value("access_token").as_deref(), Some("at"));
    }
}
