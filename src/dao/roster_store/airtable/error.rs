//! Error types shared by the Airtable roster store.

use reqwest::StatusCode;
use thiserror::Error;

/// Convenient result alias returning [`AirtableDaoError`] failures.
pub type AirtableResult<T> = Result<T, AirtableDaoError>;

/// Failures that can occur while talking to the Airtable REST API.
#[derive(Debug, Error)]
pub enum AirtableDaoError {
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build Airtable client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// A request could not be sent.
    #[error("failed to send Airtable request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// Airtable answered with a non-success status code.
    #[error("unexpected Airtable response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    /// Response payload could not be decoded.
    #[error("failed to decode Airtable response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// A row holds a value that cannot be mapped onto the domain model.
    #[error("invalid value in field `{field}` of record `{record_id}`")]
    InvalidField {
        record_id: String,
        field: &'static str,
    },
}
