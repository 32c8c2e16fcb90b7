//! Remote admin API access
//!
//! - [`RequestExecutor`] - status classification, backoff and retry ceiling
//! - [`Transport`] - one HTTP exchange; [`ReqwestTransport`] in production
//! - [`CredentialPool`] - one or more basic-auth pairs, picked per task
//! - [`Endpoints`] - URL construction for every admin route used
//! - [`verify_credentials`] / [`remote_version`] - startup checks

mod credentials;
mod endpoints;
mod error;
mod executor;
mod system;
pub mod transport;

pub use credentials::{CredentialPool, Credentials, CredentialsError};
pub use endpoints::{EndpointError, Endpoints};
pub use error::{RemoteError, TransportError};
pub use executor::{Classification, RequestExecutor, RetryPolicy, classify};
pub use system::{SystemError, remote_version, verify_credentials};
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, RequestBody, ResponseSink, Transport};
