use super::{
    client::{ApiCall, DriveClient},
    join_path,
    models::{Listing, ObjectType, RemoteObject},
};
use crate::error::Result;
use serde::Deserialize;

/// [`DriveClient::listdir`] 的可选参数。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// 只保留这些类型的对象；为空时不过滤。
    pub type_filter: Vec<ObjectType>,
    /// 直接作为 `limit` 查询参数传给服务端。
    pub limit: Option<u32>,
    /// 返回完整元数据而不是 id；`None` 时沿用客户端配置。
    pub objects: Option<bool>,
}

impl ListOptions {
    pub fn of_type(mut self, kind: ObjectType) -> Self {
        self.type_filter.push(kind);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn objects(mut self, objects: bool) -> Self {
        self.objects = Some(objects);
        self
    }
}

#[derive(Debug, Deserialize)]
struct FilesResponse {
    #[serde(default)]
    data: Vec<RemoteObject>,
}

impl DriveClient {
    /// 列出文件夹内容：`GET <folder>/files`，结果以名称为键。
    /// 类型过滤在本地进行，`limit` 由服务端处理。
    pub fn listdir(&mut self, folder_id: &str, options: &ListOptions) -> Result<Listing> {
        let call = ApiCall::new(join_path(folder_id, "files"))
            .query("limit", options.limit.map(|limit| limit.to_string()));
        let mut items = self.call(call)?.parse::<FilesResponse>()?.data;

        if !options.type_filter.is_empty() {
            items.retain(|object| options.type_filter.contains(&object.kind));
        }

        let listing = if options.objects.unwrap_or(self.return_objects) {
            Listing::Objects(
                items
                    .into_iter()
                    .map(|object| (object.name.clone(), object))
                    .collect(),
            )
        } else {
            Listing::Ids(
                items
                    .into_iter()
                    .map(|object| (object.name, object.id))
                    .collect(),
            )
        };
        Ok(listing)
    }
}
