use super::{
    client::{ApiCall, DriveClient},
    join_path,
    models::RemoteObject,
};
use crate::api::client::{FilePart, HttpMethod};
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use tracing::info;

impl DriveClient {
    /// 以 multipart 方式把本地文件上传到指定文件夹，远端文件名沿用本地文件名。
    /// - `overwrite` 为 `None` 时不带该参数，由服务端决定是否覆盖。
    /// - 文件一次性读入内存，适合普通大小的文件。
    pub fn put(
        &mut self,
        local_path: impl AsRef<Path>,
        folder_id: &str,
        overwrite: Option<bool>,
    ) -> Result<RemoteObject> {
        let local_path = local_path.as_ref();
        let file_name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "cannot upload {}: path has no file name",
                    local_path.display()
                ))
            })?;
        let content = fs::read(local_path)?;
        let size = content.len();

        let call = ApiCall::new(join_path(folder_id, "files"))
            .method(HttpMethod::Post)
            .query("overwrite", overwrite.map(|flag| flag.to_string()))
            .file(FilePart {
                field: "file".to_string(),
                file_name: file_name.clone(),
                content,
            });
        let uploaded: RemoteObject = self.call(call)?.parse()?;
        info!(file_name, size, id = %uploaded.id, "uploaded file");
        Ok(uploaded)
    }
}
