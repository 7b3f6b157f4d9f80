use std::error::Error;

use reqwest::header::HeaderMap;

/// Terminal state of one HTTP attempt.
#[derive(Clone, Copy, Debug)]
pub enum AttemptOutcome<'a> {
    /// The request failed before a response was obtained.
    TransportError(&'a (dyn Error + Send + Sync + 'static)),
    /// A response arrived. `status` is kept raw so that 0 and
    /// out-of-range codes can still be classified.
    Response { status: u16, headers: &'a HeaderMap },
}

impl<'a> AttemptOutcome<'a> {
    pub fn from_reqwest(result: &'a reqwest::Result<reqwest::Response>) -> Self {
        match result {
            Ok(response) => AttemptOutcome::Response {
                status: response.status().as_u16(),
                headers: response.headers(),
            },
            Err(err) => AttemptOutcome::TransportError(err),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            AttemptOutcome::Response { status, .. } => Some(*status),
            AttemptOutcome::TransportError(_) => None,
        }
    }
}
