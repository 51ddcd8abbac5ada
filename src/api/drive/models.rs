use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// API 在 `type` 字段中返回的对象类型，无法识别的值归为 `Unknown`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    File,
    Folder,
    Album,
    Photo,
    Audio,
    Video,
    Notebook,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::File => "file",
            ObjectType::Folder => "folder",
            ObjectType::Album => "album",
            ObjectType::Photo => "photo",
            ObjectType::Audio => "audio",
            ObjectType::Video => "video",
            ObjectType::Notebook => "notebook",
            ObjectType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 文件、文件夹等对象的元数据。
/// 只解析 `id`、`name` 与 `type`，其余字段原样保存在 `extra` 中。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ObjectType,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RemoteObject {
    /// 读取未解析的原始字段。
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.extra.get(key)
    }

    pub fn size(&self) -> Option<u64> {
        self.field("size").and_then(serde_json::Value::as_u64)
    }
}

/// 存储用量，单位为字节。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Quota {
    pub available: u64,
    pub quota: u64,
}

/// 以对象名为键的目录内容，值为 id 或完整元数据。
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    Ids(BTreeMap<String, String>),
    Objects(BTreeMap<String, RemoteObject>),
}

impl Listing {
    pub fn len(&self) -> usize {
        match self {
            Listing::Ids(ids) => ids.len(),
            Listing::Objects(objects) => objects.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 按名称查找对象 id。
    pub fn id_of(&self, name: &str) -> Option<&str> {
        match self {
            Listing::Ids(ids) => ids.get(name).map(String::as_str),
            Listing::Objects(objects) => objects.get(name).map(|o| o.id.as_str()),
        }
    }

    pub fn into_ids(self) -> BTreeMap<String, String> {
        match self {
            Listing::Ids(ids) => ids,
            Listing::Objects(objects) => objects
                .into_iter()
                .map(|(name, object)| (name, object.id))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remote_object_keeps_unknown_fields() {
        let object: RemoteObject = serde_json::from_value(json!({
            "id": "file.a1",
            "name": "report.pdf",
            "type": "file",
            "size": 2048,
            "upload_location": "https://apis.live.net/v5.0/file.a1/content/",
        }))
        .unwrap();

        assert_eq!(object.kind, ObjectType::File);
        assert_eq!(object.size(), Some(2048));
        assert!(object.field("upload_location").is_some());

        let back = serde_json::to_value(&object).unwrap();
        assert_eq!(back["type"], "file");
        assert_eq!(back["upload_location"], "https://apis.live.net/v5.0/file.a1/content/");
    }

    #[test]
    fn test_unrecognised_type_is_unknown() {
        let object: RemoteObject =
            serde_json::from_value(json!({"id": "x.1", "name": "x", "type": "hologram"})).unwrap();
        assert_eq!(object.kind, ObjectType::Unknown);

        let object: RemoteObject = serde_json::from_value(json!({"id": "file.2"})).unwrap();
        assert_eq!(object.kind, ObjectType::Unknown);
        assert_eq!(object.name, "");
    }

    #[test]
    fn test_object_type_display_matches_wire_name() {
        let kind: ObjectType = serde_json::from_value(json!("album")).unwrap();
        assert_eq!(kind, ObjectType::Album);
        assert_eq!(kind.to_string(), "album");
    }

    #[test]
    fn test_listing_into_ids() {
        let object: RemoteObject =
            serde_json::from_value(json!({"id": "folder.1", "name": "Docs", "type": "folder"}))
                .unwrap();
        let listing = Listing::Objects(BTreeMap::from([("Docs".to_string(), object)]));
        assert_eq!(listing.id_of("Docs"), Some("folder.1"));
        assert_eq!(
            listing.into_ids(),
            BTreeMap::from([("Docs".to_string(), "folder.1".to_string())])
        );
    }
}
