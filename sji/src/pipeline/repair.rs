//! Stale repository reference repair for v2 permission targets

use tracing::{debug, info};

use crate::remote::{Credentials, Endpoints, HttpRequest, RemoteError, RequestExecutor};

/// Suffix the export carries on remote-cache repository keys
pub const CACHE_SUFFIX: &str = "-cache";

async fn exists(
    executor: &RequestExecutor,
    endpoints: &Endpoints,
    key: &str,
    credentials: &Credentials,
) -> Result<bool, RemoteError> {
    let response = executor
        .execute(&HttpRequest::head(endpoints.repository(key)), credentials)
        .await?;
    debug!(%key, status = response.status, "exists: probed");
    Ok(response.status == 200)
}

/// Keep present keys, swap `x-cache` for `x` when only `x` exists, drop the rest
///
/// Order of the surviving keys is preserved. Any executor error aborts the repair.
pub async fn repair_repositories(
    executor: &RequestExecutor,
    endpoints: &Endpoints,
    keys: &[String],
    credentials: &Credentials,
) -> Result<Vec<String>, RemoteError> {
    debug!(?keys, "repair_repositories: called");
    let mut repaired = Vec::with_capacity(keys.len());

    for key in keys {
        if exists(executor, endpoints, key, credentials).await? {
            repaired.push(key.clone());
            continue;
        }
        if let Some(stripped) = key.strip_suffix(CACHE_SUFFIX)
            && !stripped.is_empty()
            && exists(executor, endpoints, stripped, credentials).await?
        {
            info!(from = %key, to = %stripped, "Substituting repository reference");
            repaired.push(stripped.to_string());
            continue;
        }
        info!(%key, "Dropping reference to missing repository");
    }

    Ok(repaired)
}
