use thiserror::Error;

/// Upstream responded, but the payload cannot be normalized. Never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SeriesError {
    #[error("{source_name}_fetch_failed:{status}")]
    HttpStatus { source_name: &'static str, status: u16 },

    #[error("{0}_empty_response")]
    EmptyResponse(&'static str),

    #[error("boe_invalid_header")]
    MissingDateColumn,

    #[error("boe_missing_series_column:{0}")]
    MissingSeriesColumn(String),

    #[error("boe_no_valid_rows:{0}")]
    NoValidRows(String),

    #[error("ons_invalid_payload: {0}")]
    InvalidPayload(String),
}
