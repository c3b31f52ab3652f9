use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("malformed candle: {0}")]
    MalformedCandle(String),

    #[error("invalid price {0}")]
    InvalidPrice(f64),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}
