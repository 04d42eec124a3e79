//! Asset upload endpoints

use axum::{extract::State, Json};
use axum_extra::extract::Multipart;
use chrono::Utc;

use crate::{
    error::{AppError, AppResult},
    models::asset::{AssetAuth, AssetUploadForm, UploadedAsset},
};

use super::{ok, ActionResponse, ClientIp};

/// Signed parameters for uploading straight from the browser
#[utoipa::path(
    get,
    path = "/assets/auth",
    tag = "assets",
    responses(
        (status = 200, description = "Upload authentication parameters", body = AssetAuth)
    )
)]
pub async fn auth_parameters(State(state): State<crate::AppState>) -> AppResult<Json<AssetAuth>> {
    let auth = state.services.assets.auth_parameters(Utc::now())?;
    Ok(Json(auth))
}

/// Upload a cover, video or university card
#[utoipa::path(
    post,
    path = "/assets/upload",
    tag = "assets",
    request_body(content = AssetUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File stored", body = UploadedAsset),
        (status = 400, description = "Missing file", body = crate::error::ErrorResponse),
        (status = 502, description = "Upload service failed", body = crate::error::ErrorResponse)
    )
)]
pub async fn upload(
    State(state): State<crate::AppState>,
    ClientIp(ip): ClientIp,
    mut multipart: Multipart,
) -> AppResult<Json<ActionResponse<UploadedAsset>>> {
    state.services.rate_limit.check(&ip).await?;

    let mut file: Option<(Vec<u8>, Option<String>)> = None;
    let mut file_name = None;
    let mut folder = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let original = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read file: {}", e)))?;
                file = Some((bytes.to_vec(), original));
            }
            "file_name" | "fileName" => {
                file_name = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(format!("Invalid file name: {}", e)))?,
                );
            }
            "folder" => {
                folder = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid folder: {}", e)))?;
            }
            _ => {}
        }
    }

    let (bytes, original) = file.ok_or_else(|| AppError::BadRequest("Missing file".to_string()))?;
    let file_name = file_name
        .or(original)
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing file name".to_string()))?;

    let asset = state.services.assets.upload(bytes, &file_name, &folder).await?;
    Ok(ok(asset))
}
