use axum::extract::Multipart;

use crate::{
    error::AppError,
    services::storage::{FileStorage, StoredFile, extension_for, is_image, object_key},
};

/// A file part read from a multipart body.
#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Which uploads a route accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    Images,
    ImagesAndPdf,
}

impl Accept {
    fn allows(self, content_type: &str) -> bool {
        match self {
            Accept::Images => is_image(content_type),
            Accept::ImagesAndPdf => extension_for(content_type).is_some(),
        }
    }
}

/// Reads every part whose field name is in `fields`, up to `max_files`.
/// Other parts are drained and ignored.
pub async fn read_files(
    multipart: &mut Multipart,
    fields: &[&str],
    accept: Accept,
    max_bytes: usize,
    max_files: usize,
) -> Result<Vec<UploadedFile>, AppError> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if !fields.contains(&name.as_str()) {
            continue;
        }
        if files.len() == max_files {
            return Err(AppError::BadRequest(format!("At most {max_files} files may be uploaded at once")));
        }

        let content_type = field
            .content_type()
            .map(str::to_owned)
            .ok_or_else(|| AppError::BadRequest("File part is missing a content type".to_string()))?;
        if !accept.allows(&content_type) {
            return Err(AppError::BadRequest(format!("Unsupported file type: {content_type}")));
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();

        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            return Err(AppError::BadRequest("Uploaded file is empty".to_string()));
        }
        if bytes.len() > max_bytes {
            return Err(AppError::PayloadTooLarge(format!("Files are limited to {max_bytes} bytes")));
        }

        files.push(UploadedFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    if files.is_empty() {
        return Err(AppError::BadRequest(format!("Expected a file in field '{}'", fields.join("' or '"))));
    }
    Ok(files)
}

/// Reads exactly one file from `field`.
pub async fn read_single(
    multipart: &mut Multipart,
    field: &str,
    accept: Accept,
    max_bytes: usize,
) -> Result<UploadedFile, AppError> {
    let mut files = read_files(multipart, &[field], accept, max_bytes, 1).await?;
    files
        .pop()
        .ok_or_else(|| AppError::BadRequest(format!("Expected a file in field '{field}'")))
}

/// Stores an upload under `folder` with a fresh key.
pub async fn store(storage: &dyn FileStorage, folder: &str, file: UploadedFile) -> Result<StoredFile, AppError> {
    let key = object_key(folder, &file.content_type)?;
    storage.put(&key, file.bytes, &file.content_type).await
}

/// Deletes a previously stored file by URL; failures are only logged.
pub async fn discard(storage: &dyn FileStorage, url: Option<&str>) {
    let Some(key) = url.and_then(|u| storage.key_from_url(u)) else {
        return;
    };
    if let Err(e) = storage.delete(&key).await {
        tracing::warn!(key, "failed to delete replaced file: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_sets() {
        assert!(Accept::Images.allows("image/png"));
        assert!(!Accept::Images.allows("application/pdf"));
        assert!(Accept::ImagesAndPdf.allows("application/pdf"));
        assert!(!Accept::ImagesAndPdf.allows("text/html"));
    }
}
