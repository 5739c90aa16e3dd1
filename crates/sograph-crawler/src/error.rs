use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Couldn't reach the API: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Response from {url} is not valid JSON: {source}")]
    MalformedResponse {
        url: String,
        source: serde_json::Error,
    },

    #[error("Unexpected response shape from {url}: {detail}")]
    SchemaError { url: String, detail: String },

    #[error("Request to {url} failed with status code {status}{}", api_message(.message))]
    HttpError {
        url: String,
        status: u16,
        message: Option<String>,
    },

    #[error("Gave up on {url} after {retries} retries")]
    RetryExhausted { url: String, retries: usize },
}

fn api_message(message: &Option<String>) -> String {
    match message {
        Some(m) => format!(": {m}"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, CrawlError>;
