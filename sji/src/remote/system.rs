//! Startup checks against the system endpoints

use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{ParseVersionError, Version, VersionInfo};

use super::credentials::Credentials;
use super::endpoints::Endpoints;
use super::error::RemoteError;
use super::executor::RequestExecutor;
use super::transport::HttpRequest;

#[derive(Debug, Error)]
pub enum SystemError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Credential check failed for '{username}': HTTP {status} {body}")]
    BadCredentials { username: String, status: u16, body: String },

    #[error("Version lookup returned HTTP {status}")]
    VersionStatus { status: u16 },

    #[error("Could not decode version response: {0}")]
    VersionBody(#[from] serde_json::Error),

    #[error(transparent)]
    VersionParse(#[from] ParseVersionError),
}

/// Ping must answer 200 with body `OK` for these credentials
pub async fn verify_credentials(
    executor: &RequestExecutor,
    endpoints: &Endpoints,
    credentials: &Credentials,
) -> Result<(), SystemError> {
    debug!(username = %credentials.username, "verify_credentials: called");
    let response = executor
        .execute(&HttpRequest::get(endpoints.ping()), credentials)
        .await?;
    let body = response.text();
    if response.status != 200 || body.trim() != "OK" {
        return Err(SystemError::BadCredentials {
            username: credentials.username.clone(),
            status: response.status,
            body: body.trim().to_string(),
        });
    }
    info!(username = %credentials.username, "Credentials verified");
    Ok(())
}

pub async fn remote_version(
    executor: &RequestExecutor,
    endpoints: &Endpoints,
    credentials: &Credentials,
) -> Result<Version, SystemError> {
    debug!("remote_version: called");
    let response = executor
        .execute(&HttpRequest::get(endpoints.version()), credentials)
        .await?;
    if response.status != 200 {
        return Err(SystemError::VersionStatus {
            status: response.status,
        });
    }
    let info: VersionInfo = serde_json::from_slice(&response.body)?;
    let version: Version = info.version.parse()?;
    info!(%version, revision = %info.revision, "Remote version");
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::transport::mock::MockTransport;
    use crate::remote::{Method, RetryPolicy};
    use std::sync::Arc;
    use std::time::Duration;

    fn setup() -> (Arc<MockTransport>, RequestExecutor, Endpoints, Credentials) {
        let mock = Arc::new(MockTransport::new());
        let executor = RequestExecutor::new(
            mock.clone(),
            RetryPolicy {
                max_retries: 0,
                backoff: Duration::ZERO,
            },
        );
        (
            mock,
            executor,
            Endpoints::new("http://remote/artifactory").unwrap(),
            Credentials::new("importer", "secret"),
        )
    }

    #[tokio::test]
    async fn test_credentials_ok() {
        let (mock, executor, endpoints, creds) = setup();
        mock.on(Method::Get, "/artifactory/api/system/ping", 200, "OK\n");
        assert!(verify_credentials(&executor, &endpoints, &creds).await.is_ok());
    }

    #[tokio::test]
    async fn test_credentials_rejected() {
        let (mock, executor, endpoints, creds) = setup();
        mock.on(Method::Get, "/artifactory/api/system/ping", 401, "Unauthorized");
        let err = verify_credentials(&executor, &endpoints, &creds).await.unwrap_err();
        assert!(matches!(err, SystemError::BadCredentials { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_credentials_forbidden_is_remote_error() {
        let (mock, executor, endpoints, creds) = setup();
        mock.on(Method::Get, "/artifactory/api/system/ping", 403, "");
        let err = verify_credentials(&executor, &endpoints, &creds).await.unwrap_err();
        assert!(matches!(err, SystemError::Remote(RemoteError::Forbidden { .. })));
    }

    #[tokio::test]
    async fn test_version() {
        let (mock, executor, endpoints, creds) = setup();
        mock.on(
            Method::Get,
            "/artifactory/api/system/version",
            200,
            r#"{"version": "6.12.2", "revision": "61202900", "addons": ["build"], "license": "x"}"#,
        );
        let version = remote_version(&executor, &endpoints, &creds).await.unwrap();
        assert_eq!(version, Version::new(6, 12, 2));
        assert!(version.supports_permission_v2());
    }

    #[tokio::test]
    async fn test_version_garbage() {
        let (mock, executor, endpoints, creds) = setup();
        mock.on(Method::Get, "/artifactory/api/system/version", 200, r#"{"version": "latest"}"#);
        let err = remote_version(&executor, &endpoints, &creds).await.unwrap_err();
        assert!(matches!(err, SystemError::VersionParse(_)));
    }
}
