use std::io::Read;

use miette::Diagnostic;
use thiserror::Error;

const USER_AGENT: &str = concat!("meteogram/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error, Diagnostic)]
pub enum NetworkError {
    #[error("Request to {url} failed with status {status}")]
    #[diagnostic(code(meteogram::fetch::status))]
    Status { url: String, status: u16 },
    #[error("Could not reach {url}")]
    #[diagnostic(code(meteogram::fetch::transport))]
    Transport {
        url: String,
        #[source]
        source: Box<ureq::Transport>,
    },
    #[error("Could not read the response body from {url}")]
    #[diagnostic(code(meteogram::fetch::body))]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// Something that turns a URL into the raw bytes of the response body.
pub trait Fetch {
    fn get(&self, url: &str) -> Result<Vec<u8>, NetworkError>;
}

impl<F: Fetch + ?Sized> Fetch for &F {
    fn get(&self, url: &str) -> Result<Vec<u8>, NetworkError> {
        (**self).get(url)
    }
}

/// Blocking HTTP client. No timeout and no retries: a failed request ends the run.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().user_agent(USER_AGENT).build(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetch for HttpFetcher {
    fn get(&self, url: &str) -> Result<Vec<u8>, NetworkError> {
        tracing::debug!(message = "making request", url);

        let response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(status, _) => NetworkError::Status {
                url: url.to_string(),
                status,
            },
            ureq::Error::Transport(transport) => NetworkError::Transport {
                url: url.to_string(),
                source: Box::new(transport),
            },
        })?;

        let mut body = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|source| NetworkError::Body {
                url: url.to_string(),
                source,
            })?;

        tracing::debug!(message = "received response", url, bytes = body.len());
        Ok(body)
    }
}
