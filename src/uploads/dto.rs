use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct UploadedFile {
    pub id: Uuid,
    pub filepath: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteFileResponse {
    pub success: bool,
    pub message: String,
}
