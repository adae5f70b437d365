use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use actix_multipart::{Field, Multipart};
use actix_web::web;
use chrono::Utc;
use futures::StreamExt;
use rand::Rng;
use regex::Regex;

use crate::errors::ServiceError;

/// name of the form field that carries the payment screenshot
pub const PROOF_FIELD: &str = "paymentScreenshot";
/// 5 MiB
pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;
const MAX_TEXT_SIZE: usize = 64 * 1024;

lazy_static! {
    static ref STORED_NAME: Regex =
        Regex::new(r"^payment-[0-9]+-[0-9]+\.(jpeg|jpg|png|gif)$").unwrap();
}

/// The directory payment screenshots are stored in
#[derive(Debug, Clone)]
pub struct UploadDir(pub String);

impl UploadDir {
    pub fn path(&self) -> &str {
        &self.0
    }
}

/// An image that was sent along with a form, not yet written to disk
#[derive(Debug)]
pub struct Upload {
    pub extension: String,
    pub data: Vec<u8>,
}

/// The text fields and the optional payment screenshot of a multipart form
#[derive(Debug, Default)]
pub struct Form {
    pub fields: HashMap<String, String>,
    pub proof: Option<Upload>,
}

pub async fn read_form(mut payload: Multipart) -> Result<Form, ServiceError> {
    let mut form = Form::default();

    while let Some(field) = payload.next().await {
        let mut field = field?;

        let disposition = match field.content_disposition() {
            Some(disposition) => disposition,
            None => bad_request!("every form field needs a content disposition"),
        };

        let name = match disposition.get_name() {
            Some(name) => name.to_string(),
            None => continue,
        };

        if name == PROOF_FIELD {
            let data = read_field(&mut field, MAX_FILE_SIZE)
                .await?
                .ok_or_else(|| {
                    ServiceError::Validation("paymentScreenshot can be at most 5MB".to_string())
                })?;

            // browsers send an empty part when no file was selected
            if data.is_empty() {
                continue;
            }

            let extension = image_extension(
                disposition.get_filename().unwrap_or_default(),
                field.content_type().essence_str(),
            )?;

            form.proof = Some(Upload { extension, data });
        } else {
            let data = match read_field(&mut field, MAX_TEXT_SIZE).await? {
                Some(data) => data,
                None => bad_request!("{} is too large", name),
            };

            match String::from_utf8(data) {
                Ok(value) => form.fields.insert(name, value),
                Err(_) => bad_request!("{} should be text", name),
            };
        }
    }

    Ok(form)
}

/// returns `None` when the field is larger than `limit` bytes
async fn read_field(field: &mut Field, limit: usize) -> Result<Option<Vec<u8>>, ServiceError> {
    let mut data = Vec::new();

    while let Some(chunk) = field.next().await {
        let chunk = chunk?;

        if data.len() + chunk.len() > limit {
            return Ok(None);
        }

        data.extend_from_slice(&chunk);
    }

    Ok(Some(data))
}

/// Only images are accepted, both the file extension and the mime type have to match
pub fn image_extension(filename: &str, mime: &str) -> Result<String, ServiceError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| extension.to_lowercase())
        .unwrap_or_default();

    let valid_extension = matches!(extension.as_str(), "jpeg" | "jpg" | "png" | "gif");
    let valid_mime = matches!(mime, "image/jpeg" | "image/jpg" | "image/png" | "image/gif");

    if !valid_extension || !valid_mime {
        bad_request!("Only image files are allowed!");
    }

    Ok(extension)
}

/// `payment-<unix millis>-<random>.<extension>`
pub fn file_name(extension: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0, 1_000_000_000);

    format!(
        "payment-{}-{}.{}",
        Utc::now().timestamp_millis(),
        suffix,
        extension
    )
}

fn stored_path(dir: &str, name: &str) -> Result<PathBuf, ServiceError> {
    if !STORED_NAME.is_match(name) {
        return Err(ServiceError::NotFound("File not found".to_string()));
    }

    Ok(Path::new(dir).join(name))
}

/// writes the upload to `dir` and returns the name it was stored under
pub async fn save(dir: &str, upload: Upload) -> Result<String, ServiceError> {
    let name = file_name(&upload.extension);
    let dir = PathBuf::from(dir);
    let path = dir.join(&name);

    web::block(move || -> Result<(), ServiceError> {
        fs::create_dir_all(&dir)?;
        fs::write(&path, &upload.data)?;
        Ok(())
    })
    .await?;

    debug!("stored payment screenshot {}", name);

    Ok(name)
}

/// Removes a stored screenshot, failures are only logged
pub async fn remove(dir: &str, name: &str) {
    let path = match stored_path(dir, name) {
        Ok(path) => path,
        Err(_) => {
            warn!("refusing to remove unexpected upload {}", name);
            return;
        }
    };

    let res = web::block(move || fs::remove_file(path)).await;

    if let Err(e) = res {
        warn!("unable to remove payment screenshot {}: {}", name, e);
    }
}

/// Reads a stored screenshot, returns its contents and mime type
pub async fn load(dir: &str, name: &str) -> Result<(Vec<u8>, &'static str), ServiceError> {
    let path = stored_path(dir, name)?;

    let mime = match path.extension().and_then(|extension| extension.to_str()) {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    };

    let data = web::block(move || fs::read(path)).await.map_err(|e| {
        debug!("unable to read payment screenshot: {}", e);
        ServiceError::NotFound("File not found".to_string())
    })?;

    Ok((data, mime))
}

/// boundary used by `form_body`
#[cfg(test)]
pub const TEST_BOUNDARY: &str = "greenfield-form-boundary";

/// Builds a `multipart/form-data` body, `file` is the filename, mime type and
/// contents of a payment screenshot
#[cfg(test)]
pub fn form_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                TEST_BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }

    if let Some((filename, mime, data)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                TEST_BOUNDARY, PROOF_FIELD, filename, mime
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{}--\r\n", TEST_BOUNDARY).as_bytes());
    body
}
