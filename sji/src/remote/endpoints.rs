//! Admin API URL construction

use reqwest::Url;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Invalid base URL '{url}': {reason}")]
pub struct EndpointError {
    pub url: String,
    pub reason: String,
}

/// URLs of the admin endpoints under a base URL
///
/// Names are appended as single percent-encoded path segments, so a name with
/// spaces or slashes never changes the route.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    pub fn new(base: &str) -> Result<Self, EndpointError> {
        let url = Url::parse(base.trim()).map_err(|e| EndpointError {
            url: base.to_string(),
            reason: e.to_string(),
        })?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(EndpointError {
                url: base.to_string(),
                reason: "expected an http(s) URL".to_string(),
            });
        }
        Ok(Self { base: url })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn join(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn group(&self, name: &str) -> Url {
        self.join(&["api", "security", "groups", name])
    }

    pub fn permission(&self, name: &str) -> Url {
        self.join(&["api", "security", "permissions", name])
    }

    pub fn permission_v2(&self, name: &str) -> Url {
        self.join(&["api", "v2", "security", "permissions", name])
    }

    pub fn user(&self, name: &str) -> Url {
        self.join(&["api", "security", "users", name])
    }

    pub fn repository(&self, key: &str) -> Url {
        self.join(&["api", "repositories", key])
    }

    pub fn ping(&self) -> Url {
        self.join(&["api", "system", "ping"])
    }

    pub fn version(&self) -> Url {
        self.join(&["api", "system", "version"])
    }
}
