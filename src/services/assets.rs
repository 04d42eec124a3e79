//! Asset uploads (covers, videos, university cards) through ImageKit

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use reqwest::multipart::{Form, Part};
use sha1::Sha1;
use uuid::Uuid;

use crate::{
    config::AssetsConfig,
    error::{AppError, AppResult},
    models::asset::{AssetAuth, UploadedAsset},
};

type HmacSha1 = Hmac<Sha1>;

/// Lifetime of client upload parameters
const AUTH_TTL_MINUTES: i64 = 30;

fn hmac_sha1_hex(key: &str, data: &str) -> AppResult<String> {
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| AppError::Internal(format!("Invalid signing key: {}", e)))?;
    mac.update(data.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Signature over `token ++ expire`
pub fn sign(private_key: &str, token: &str, expire: i64) -> AppResult<String> {
    hmac_sha1_hex(private_key, &format!("{}{}", token, expire))
}

/// Join the public endpoint and a stored file path with exactly one slash
pub fn public_url(endpoint: &str, file_path: &str) -> String {
    format!(
        "{}/{}",
        endpoint.trim_end_matches('/'),
        file_path.trim_start_matches('/')
    )
}

#[derive(Clone)]
pub struct AssetsService {
    config: AssetsConfig,
    client: reqwest::Client,
}

impl AssetsService {
    pub fn new(config: AssetsConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Upload parameters valid for 30 minutes from `now`
    pub fn auth_parameters(&self, now: DateTime<Utc>) -> AppResult<AssetAuth> {
        let token = Uuid::new_v4().to_string();
        let expire = (now + Duration::minutes(AUTH_TTL_MINUTES)).timestamp();
        let signature = sign(&self.config.private_key, &token, expire)?;
        Ok(AssetAuth {
            token,
            expire,
            signature,
            public_key: self.config.public_key.clone(),
        })
    }

    pub fn public_url(&self, file_path: &str) -> String {
        public_url(&self.config.url_endpoint, file_path)
    }

    /// Forward a file to the upload API and return its stored path
    pub async fn upload(&self, file: Vec<u8>, file_name: &str, folder: &str) -> AppResult<UploadedAsset> {
        if file.is_empty() {
            return Err(AppError::BadRequest("File is empty".to_string()));
        }

        let form = Form::new()
            .part("file", Part::bytes(file).file_name(file_name.to_string()))
            .text("fileName", file_name.to_string())
            .text("folder", folder.to_string())
            .text("useUniqueFileName", "true");

        let response = self
            .client
            .post(&self.config.upload_url)
            .basic_auth(&self.config.private_key, Some(""))
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::External(format!("Upload request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::External(format!("Upload rejected ({}): {}", status, body)));
        }

        let mut asset: UploadedAsset = response
            .json()
            .await
            .map_err(|e| AppError::External(format!("Invalid upload response: {}", e)))?;
        if asset.url.is_empty() {
            asset.url = self.public_url(&asset.file_path);
        }

        tracing::info!("Uploaded {} to {}", file_name, asset.file_path);
        Ok(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_hmac_sha1_known_vector() {
        // RFC 2202, test case 2
        assert_eq!(
            hmac_sha1_hex("Jefe", "what do ya want for nothing?").unwrap(),
            "effcdf6ae5eb2fa2d27416d5f184df9c259a7c79"
        );
    }

    #[test]
    fn test_signature_covers_token_and_expire() {
        let a = sign("private_key", "token", 1_700_000_000).unwrap();
        assert_eq!(a, hmac_sha1_hex("private_key", "token1700000000").unwrap());
        assert_ne!(a, sign("private_key", "token", 1_700_000_001).unwrap());
        assert_eq!(a.len(), 40);
    }

    #[test]
    fn test_auth_parameters_expire_in_thirty_minutes() {
        let service = AssetsService::new(AssetsConfig {
            private_key: "private_key".to_string(),
            public_key: "public_key".to_string(),
            ..AssetsConfig::default()
        });
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let auth = service.auth_parameters(now).unwrap();

        assert_eq!(auth.expire, now.timestamp() + 1800);
        assert_eq!(auth.public_key, "public_key");
        assert!(Uuid::parse_str(&auth.token).is_ok());
        assert_eq!(auth.signature, sign("private_key", &auth.token, auth.expire).unwrap());
    }

    #[test]
    fn test_public_url_join() {
        assert_eq!(public_url("https://ik.imagekit.io/lib/", "/books/a.png"), "https://ik.imagekit.io/lib/books/a.png");
        assert_eq!(public_url("https://ik.imagekit.io/lib", "books/a.png"), "https://ik.imagekit.io/lib/books/a.png");
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let service = AssetsService::new(AssetsConfig::default());
        let result = service.upload(Vec::new(), "cover.png", "books/covers").await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
