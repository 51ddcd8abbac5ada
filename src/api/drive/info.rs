use super::{
    client::{ApiCall, DriveClient},
    models::{Quota, RemoteObject},
    QUOTA_PATH,
};
use crate::error::Result;

impl DriveClient {
    /// 查询账户配额：`GET me/skydrive/quota`，返回剩余与总容量（字节）。
    pub fn get_quota(&mut self) -> Result<Quota> {
        self.call(ApiCall::new(QUOTA_PATH))?.parse()
    }

    /// 获取单个对象的元数据，`me/skydrive` 表示根目录。
    pub fn info(&mut self, obj_id: &str) -> Result<RemoteObject> {
        self.call(ApiCall::new(obj_id))?.parse()
    }
}
