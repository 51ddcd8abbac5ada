use super::client::{ApiCall, DriveClient};
use crate::api::client::HttpMethod;
use crate::error::Result;
use tracing::info;

impl DriveClient {
    /// 删除文件或文件夹。服务端成功时返回 204，无法撤销。
    pub fn delete(&mut self, obj_id: &str) -> Result<()> {
        self.call(ApiCall::new(obj_id).method(HttpMethod::Delete))?;
        info!(obj_id, "deleted object");
        Ok(())
    }
}
