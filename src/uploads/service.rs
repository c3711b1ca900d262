use anyhow::Context;
use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use super::repo::Attachment;
use crate::state::AppState;

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "bmp", "webp"];

pub struct UploadItem {
    pub origin_name: String,
    pub content_type: String,
    pub body: Bytes,
}

pub struct StoredFile {
    pub id: Uuid,
    pub filepath: String,
}

/// Lowercased extension without the dot, if the name has one.
pub(crate) fn file_ext(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub(crate) fn is_image_ext(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext)
}

/// Storage key for one uploaded file. The original filename is only kept as
/// metadata; the key is collision-free on its own.
pub(crate) fn object_key(directory: &str, id: Uuid, ext: Option<&str>) -> String {
    match ext {
        Some(ext) => format!("{}/{}.{}", directory, id, ext),
        None => format!("{}/{}", directory, id),
    }
}

/// Store each file in object storage, then record its metadata. If the
/// metadata insert fails the just-written object is removed so storage and
/// the table stay in sync.
pub async fn store_files(
    st: &AppState,
    directory: &str,
    target_type: &str,
    target: &str,
    files: Vec<UploadItem>,
) -> anyhow::Result<Vec<StoredFile>> {
    anyhow::ensure!(!files.is_empty(), "no files provided");

    let mut stored = Vec::with_capacity(files.len());
    for file in files {
        let id = Uuid::new_v4();
        let ext = file_ext(&file.origin_name);
        let key = object_key(directory, id, ext.as_deref());

        st.storage
            .put_object(&key, file.body, &file.content_type)
            .await
            .with_context(|| format!("put_object {}", key))?;

        let ext = ext.unwrap_or_default();
        let attachment = match Attachment::create(
            &st.db,
            target_type,
            target,
            &file.origin_name,
            &key,
            &ext,
            is_image_ext(&ext),
        )
        .await
        {
            Ok(a) => a,
            Err(e) => {
                // Don't leave an unreferenced object behind.
                if let Err(del) = st.storage.delete_object(&key).await {
                    warn!(error = %del, key = %key, "failed to clean up orphaned object");
                }
                return Err(e).context("insert attachment metadata");
            }
        };

        stored.push(StoredFile {
            id: attachment.id,
            filepath: attachment.filepath,
        });
    }

    Ok(stored)
}

/// Delete the attachment row and its stored object for a given filepath.
/// Used when a profile image is replaced or removed. A filepath with no
/// metadata row still gets a best-effort object delete.
pub async fn remove_attachment_by_filepath(st: &AppState, filepath: &str) -> anyhow::Result<()> {
    match Attachment::find_by_filepath(&st.db, filepath).await? {
        Some(attachment) => {
            if let Err(e) = st.storage.delete_object(&attachment.filepath).await {
                warn!(error = %e, filepath = %attachment.filepath, "failed to delete stored object");
            }
            Attachment::delete(&st.db, attachment.id).await?;
        }
        None => {
            if let Err(e) = st.storage.delete_object(filepath).await {
                warn!(error = %e, filepath = %filepath, "failed to delete unreferenced object");
            }
        }
    }
    Ok(())
}
