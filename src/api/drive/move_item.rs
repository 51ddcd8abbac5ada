use super::{
    client::{ApiCall, DriveClient},
    models::RemoteObject,
    ROOT_ID,
};
use crate::api::client::{HttpMethod, RequestData};
use crate::error::Result;
use tracing::info;

impl DriveClient {
    /// 将文件复制到目标文件夹（服务端不支持复制文件夹）。
    pub fn copy_item(&mut self, obj_id: &str, folder_id: &str) -> Result<RemoteObject> {
        self.copy_or_move(HttpMethod::Copy, obj_id, folder_id)
    }

    /// 将文件/文件夹移动到目标文件夹。
    pub fn move_item(&mut self, obj_id: &str, folder_id: &str) -> Result<RemoteObject> {
        self.copy_or_move(HttpMethod::Move, obj_id, folder_id)
    }

    /// COPY 与 MOVE 共用的请求流程：token 走 Authorization 头，请求体为 JSON。
    fn copy_or_move(
        &mut self,
        method: HttpMethod,
        obj_id: &str,
        folder_id: &str,
    ) -> Result<RemoteObject> {
        // 服务端只接受真实的文件夹 id，`me/skydrive` 这类别名需要先换成 id。
        let destination = if folder_id.starts_with(ROOT_ID) {
            let id = self.info(folder_id)?.id;
            info!(alias = folder_id, id = %id, "resolved destination alias");
            id
        } else {
            folder_id.to_string()
        };

        let mut data = RequestData::new();
        data.insert("destination".to_string(), destination);
        let call = ApiCall::new(obj_id)
            .method(method)
            .data(data)
            .auth_header();
        self.call(call)?.parse()
    }
}
