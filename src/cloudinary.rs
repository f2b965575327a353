// cloudinary.rs
// Signed admin-API client for deleting uploaded images. Uploads happen
// browser-side against the unsigned upload endpoint and are not proxied
// here.

use anyhow::{Context, Result};
use data_encoding::HEXLOWER;
use serde_json::Value;
use sha1::{Digest, Sha1};
use std::env;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl CloudinaryConfig {
    pub fn from_env() -> Option<Self> {
        let cloud_name = env::var("CLOUDINARY_CLOUD_NAME").ok()?;
        let api_key = env::var("CLOUDINARY_API_KEY").ok()?;
        let api_secret = env::var("CLOUDINARY_API_SECRET").ok()?;
        Some(CloudinaryConfig {
            cloud_name,
            api_key,
            api_secret,
        })
    }
}

/// Calls the `destroy` endpoint for a public id. Returns whether the
/// service actually removed the asset (`result == "ok"`).
pub async fn destroy(
    http: &reqwest::Client,
    config: &CloudinaryConfig,
    public_id: &str,
) -> Result<bool> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock before unix epoch")?
        .as_secs();
    let signature = api_signature(public_id, timestamp, &config.api_secret);

    let url = format!(
        "https://api.cloudinary.com/v1_1/{}/image/destroy",
        config.cloud_name
    );
    let params = [
        ("public_id", public_id.to_string()),
        ("timestamp", timestamp.to_string()),
        ("api_key", config.api_key.clone()),
        ("signature", signature),
    ];

    let response = http
        .post(&url)
        .form(&params)
        .send()
        .await
        .context("cloudinary request failed")?;
    let body: Value = response
        .json()
        .await
        .context("cloudinary response was not JSON")?;

    Ok(body.get("result").and_then(Value::as_str) == Some("ok"))
}

/// SHA-1 over the sorted parameter string plus the secret, hex-encoded,
/// per the Cloudinary authentication scheme.
pub fn api_signature(public_id: &str, timestamp: u64, api_secret: &str) -> String {
    let payload = format!("public_id={public_id}&timestamp={timestamp}{api_secret}");
    let mut hasher = Sha1::new();
    hasher.update(payload.as_bytes());
    HEXLOWER.encode(&hasher.finalize())
}

/// Extracts the public id from a delivery URL:
/// `…/upload/v1712345678/products/abc123.png` -> `products/abc123`.
pub fn extract_public_id(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("/upload/")?;
    let mut segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    if let Some(first) = segments.first() {
        let is_version = first.len() > 1
            && first.starts_with('v')
            && first[1..].chars().all(|c| c.is_ascii_digit());
        if is_version {
            segments.remove(0);
        }
    }
    if segments.is_empty() {
        return None;
    }
    let joined = segments.join("/");
    let public_id = match joined.rsplit_once('.') {
        Some((base, ext)) if !ext.contains('/') => base.to_string(),
        _ => joined,
    };
    if public_id.is_empty() {
        None
    } else {
        Some(public_id)
    }
}
