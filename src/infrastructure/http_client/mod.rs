//! HTTP adapters: the Supabase (PostgREST) review table and shared error mapping.

mod supabase_store;

pub use supabase_store::SupabaseReviewStore;

use serde::Deserialize;

/// Error body returned by PostgREST and most JSON APIs.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    #[serde(default, alias = "error")]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

/// Flattens a `ureq` failure into a readable message, including the remote error body when present.
pub fn describe_http_error(error: ureq::Error) -> String {
    match error {
        ureq::Error::Status(status, response) => {
            match response.into_json::<ErrorResponse>() {
                Ok(ErrorResponse {
                    message: Some(message),
                    code,
                }) => match code {
                    Some(code) => format!("HTTP {status} - {code}: {message}"),
                    None => format!("HTTP {status}: {message}"),
                },
                _ => format!("HTTP error: {status}"),
            }
        }
        ureq::Error::Transport(transport) => format!("Transport error: {transport}"),
    }
}
