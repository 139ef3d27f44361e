use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request to image API failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Image API returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Failed to parse image API response: {0}")]
    ParseResponse(String),

    #[error("Image API response carried no image data")]
    NoImage,

    #[error("Image generation is not configured: {0}")]
    NotConfigured(String),

    #[error("Image API call failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<GenerationError>,
    },
}

pub type Result<T> = std::result::Result<T, GenerationError>;
