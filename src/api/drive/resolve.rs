use super::{
    client::DriveClient,
    list::ListOptions,
    models::RemoteObject,
    ROOT_ID,
};
use crate::error::{Error, Result};
use std::path::MAIN_SEPARATOR;
use tracing::debug;

/// 路径解析的可选参数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
    /// 相对路径的起点文件夹。
    pub root_id: String,
    /// 路径段本身是父目录中某个对象的 id 时，直接以它为结果并停止解析。
    pub id_fallback: bool,
    /// 返回元数据而不是 id；`None` 时沿用客户端配置。
    pub objects: Option<bool>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        ResolveOptions {
            root_id: ROOT_ID.to_string(),
            id_fallback: false,
            objects: None,
        }
    }
}

impl ResolveOptions {
    pub fn root(mut self, root_id: impl Into<String>) -> Self {
        self.root_id = root_id.into();
        self
    }

    pub fn id_fallback(mut self, enabled: bool) -> Self {
        self.id_fallback = enabled;
        self
    }

    pub fn objects(mut self, objects: bool) -> Self {
        self.objects = Some(objects);
        self
    }
}

/// 路径解析结果：仅 id，或带完整元数据的对象。
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Id(String),
    Object(RemoteObject),
}

impl Resolved {
    pub fn id(&self) -> &str {
        match self {
            Resolved::Id(id) => id,
            Resolved::Object(object) => &object.id,
        }
    }

    pub fn into_id(self) -> String {
        match self {
            Resolved::Id(id) => id,
            Resolved::Object(object) => object.id,
        }
    }
}

impl DriveClient {
    /// 把类似文件系统的路径（由对象名组成）解析为对象 id。
    /// - 每一级路径都要列一次目录，层级越深请求越多。
    /// - 以 `me/skydrive` 开头的路径视为 id，不做遍历。
    pub fn resolve_path(&mut self, path: &str, options: &ResolveOptions) -> Result<Resolved> {
        if path.starts_with(ROOT_ID) {
            return self.finish_resolve(path.to_string(), options);
        }
        let segments: Vec<&str> = path
            .split(MAIN_SEPARATOR)
            .filter(|segment| !segment.is_empty())
            .collect();
        self.resolve_segments(&segments, options)
    }

    /// 与 [`resolve_path`](Self::resolve_path) 相同，但直接接收已拆分的名称序列。
    pub fn resolve_segments<S: AsRef<str>>(
        &mut self,
        names: &[S],
        options: &ResolveOptions,
    ) -> Result<Resolved> {
        let mut current = options.root_id.clone();
        for name in names {
            let name = name.as_ref();
            let children = self
                .listdir(&current, &ListOptions::default().objects(false))?
                .into_ids();
            current = match children.get(name) {
                Some(id) => id.clone(),
                None if options.id_fallback && children.values().any(|id| id == name) => {
                    // 已经是 id，后续路径段不再解析。
                    debug!(segment = name, "path segment matched an object id");
                    return self.finish_resolve(name.to_string(), options);
                }
                None => {
                    return Err(Error::NotFound {
                        name: name.to_string(),
                        parent: current,
                    })
                }
            };
        }
        self.finish_resolve(current, options)
    }

    fn finish_resolve(&mut self, id: String, options: &ResolveOptions) -> Result<Resolved> {
        if options.objects.unwrap_or(self.return_objects) {
            Ok(Resolved::Object(self.info(&id)?))
        } else {
            Ok(Resolved::Id(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::StoredAuthState;
    use crate::api::client::{RawResponse, Transport};
    use crate::settings::ClientConfig;
    use crate::testing::ScriptedBackend;
    use serde_json::json;
    use std::sync::Arc;

    fn client(responses: Vec<RawResponse>) -> (DriveClient, Arc<ScriptedBackend>) {
        let backend = ScriptedBackend::new(responses);
        let client = DriveClient::with_transport(
            ClientConfig::new("client-1", "secret-1"),
            Transport::new(backend.clone()),
        )
        .unwrap()
        .with_state(StoredAuthState {
            access_token: Some("at".to_string()),
            ..StoredAuthState::default()
        });
        (client, backend)
    }

    fn listing(entries: &[(&str, &str)]) -> RawResponse {
        let data: Vec<serde_json::Value> = entries
            .iter()
            .map(|(name, id)| json!({"id": id, "name": name, "type": "folder"}))
            .collect();
        RawResponse::json(200, &json!({ "data": data }))
    }

    #[test]
    fn test_single_segment_direct_lookup() {
        let (mut client, backend) = client(vec![listing(&[("a", "id1"), ("b", "id2")])]);

        let resolved = client.resolve_path("a", &ResolveOptions::default()).unwrap();
        assert_eq!(resolved, Resolved::Id("id1".to_string()));
        assert!(backend.single_request().url.contains("/me/skydrive/files?"));
    }

    #[test]
    fn test_nested_path_lists_each_level() {
        let (mut client, backend) = client(vec![
            listing(&[("Documents", "folder.d")]),
            listing(&[("Work", "folder.w")]),
            listing(&[("plan.txt", "file.p")]),
        ]);

        let resolved = client
            .resolve_path("/Documents//Work/plan.txt", &ResolveOptions::default())
            .unwrap();
        assert_eq!(resolved.id(), "file.p");

        let urls: Vec<String> = backend.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(urls.len(), 3);
        assert!(urls[1].contains("/folder.d/files?"));
        assert!(urls[2].contains("/folder.w/files?"));
    }

    #[test]
    fn test_id_fallback_accepts_known_id() {
        let (mut client, _) = client(vec![listing(&[("a", "x"), ("b", "id2")])]);

        let resolved = client
            .resolve_path("x", &ResolveOptions::default().id_fallback(true))
            .unwrap();
        assert_eq!(resolved, Resolved::Id("x".to_string()));
    }

    #[test]
    fn test_id_fallback_stops_at_matched_id() {
        let (mut client, backend) = client(vec![listing(&[("a", "folder.x")])]);

        let resolved = client
            .resolve_path("folder.x/deeper/file.txt", &ResolveOptions::default().id_fallback(true))
            .unwrap();
        assert_eq!(resolved, Resolved::Id("folder.x".to_string()));
        assert_eq!(backend.requests().len(), 1);
    }

    #[test]
    fn test_missing_name_without_fallback_is_not_found() {
        let (mut client, _) = client(vec![listing(&[("a", "x")])]);

        let err = client.resolve_path("x", &ResolveOptions::default()).unwrap_err();
        match err {
            Error::NotFound { name, parent } => {
                assert_eq!(name, "x");
                assert_eq!(parent, ROOT_ID);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_fallback_still_fails_for_unknown_id() {
        let (mut client, _) = client(vec![listing(&[("a", "id1")])]);
        let err = client
            .resolve_path("zzz", &ResolveOptions::default().id_fallback(true))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_root_prefixed_path_skips_traversal() {
        let (mut client, backend) = client(Vec::new());

        let resolved = client
            .resolve_path("me/skydrive/camera_roll", &ResolveOptions::default())
            .unwrap();
        assert_eq!(resolved.into_id(), "me/skydrive/camera_roll");
        assert!(backend.requests().is_empty());
    }

    #[test]
    fn test_empty_path_is_root() {
        let (mut client, backend) = client(Vec::new());
        let resolved = client
            .resolve_path("", &ResolveOptions::default().root("folder.base"))
            .unwrap();
        assert_eq!(resolved.id(), "folder.base");
        assert!(backend.requests().is_empty());
    }

    #[test]
    fn test_objects_mode_fetches_metadata() {
        let (mut client, backend) = client(vec![
            listing(&[("a", "folder.a")]),
            RawResponse::json(200, &json!({"id": "folder.a", "name": "a", "type": "folder", "count": 3})),
        ]);

        let resolved = client
            .resolve_segments(&["a"][..], &ResolveOptions::default().objects(true))
            .unwrap();
        match resolved {
            Resolved::Object(object) => {
                assert_eq!(object.id, "folder.a");
                assert_eq!(object.field("count"), Some(&json!(3)));
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert!(backend.requests()[1].url.contains("/folder.a?"));
    }
}
