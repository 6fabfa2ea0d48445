use axum::response::{IntoResponse, Redirect, Response};
use std::time::Duration;

use crate::{error::ApiError, models::Resource, storage::StorageService};

/// Validity window of signed URLs. Also the longest a link outlives the
/// entitlement check that issued it.
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(60);

/// AccessGrant
///
/// Where the caller is sent to fetch a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessGrant {
    /// Stable public URL of a free resource.
    Public(String),
    /// Short-lived signed URL into the private bucket.
    Signed(String),
}

impl AccessGrant {
    pub fn url(&self) -> &str {
        match self {
            AccessGrant::Public(url) | AccessGrant::Signed(url) => url,
        }
    }
}

impl IntoResponse for AccessGrant {
    fn into_response(self) -> Response {
        Redirect::temporary(self.url()).into_response()
    }
}

/// issue_grant
///
/// First match wins:
/// 1. free resource with a public URL: that URL, whatever the caller's plan;
/// 2. no private path: `InvalidResourceState`;
/// 3. otherwise a signed URL for the private path, valid for `SIGNED_URL_TTL`
///    (`SigningFailed` if storage refuses).
///
/// Entitlement is the caller's job: this only maps a resource to a location.
pub async fn issue_grant(
    resource: &Resource,
    storage: &dyn StorageService,
) -> Result<AccessGrant, ApiError> {
    if !resource.is_premium() {
        if let Some(url) = resource.public_url.as_deref().filter(|url| !url.is_empty()) {
            return Ok(AccessGrant::Public(url.to_string()));
        }
    }

    let path = resource
        .file_path
        .as_deref()
        .filter(|path| !path.is_empty())
        .ok_or_else(|| {
            tracing::warn!(resource_id = %resource.id, "resource has no file_path");
            ApiError::InvalidResourceState
        })?;

    let url = storage
        .create_signed_url(path, SIGNED_URL_TTL)
        .await
        .map_err(|e| {
            tracing::error!(resource_id = %resource.id, error = %e, "signing failed");
            ApiError::SigningFailed
        })?;

    Ok(AccessGrant::Signed(url))
}
