mod client;
mod delete;
mod download;
mod info;
mod list;
mod models;
mod move_item;
mod resolve;
mod upload;

pub use client::{filter_query, ApiCall, DriveClient};
pub use list::ListOptions;
pub use models::{Listing, ObjectType, Quota, RemoteObject};
pub use resolve::{ResolveOptions, Resolved};

/// 当前登录用户根目录的 id 别名。
pub const ROOT_ID: &str = "me/skydrive";

/// 配额查询路径。
pub(crate) const QUOTA_PATH: &str = "me/skydrive/quota";

/// 拼接 `<id>/<segment>`，避免出现重复的分隔符。
pub(crate) fn join_path(id: &str, segment: &str) -> String {
    format!("{}/{}", id.trim_end_matches('/'), segment)
}
