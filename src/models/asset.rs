//! Uploaded asset metadata

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Parameters a browser needs to upload straight to the asset service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AssetAuth {
    pub token: String,
    /// Unix seconds
    pub expire: i64,
    pub signature: String,
    /// Key the browser upload widget identifies the account with
    pub public_key: String,
}

/// Result of an upload
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadedAsset {
    /// Path to store on the book or user row
    pub file_path: String,
    #[serde(default)]
    pub url: String,
}

/// Upload form accepted by `POST /assets/upload`
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct AssetUploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    pub file_name: String,
    /// e.g. `books/covers`, `ids`
    pub folder: String,
}
