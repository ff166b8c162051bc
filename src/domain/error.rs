//! Domain error types.

/// Failure reported by an order gateway. Never fatal to a scan.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("order rejected for {symbol}: {reason}")]
    Rejected { symbol: String, reason: String },

    #[error("order gateway unavailable: {0}")]
    Unavailable(String),
}

/// Top-level error type for zonetrader.
#[derive(Debug, thiserror::Error)]
pub enum ZonetraderError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("malformed data in {source_name}: {reason}")]
    DataFormat { source_name: String, reason: String },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("invalid pivot levels for {symbol} {year}: {reason}")]
    InvalidPivots {
        symbol: String,
        year: i32,
        reason: String,
    },

    #[error("overlapping membership intervals for {symbol}: {first} and {second}")]
    MembershipOverlap {
        symbol: String,
        first: String,
        second: String,
    },

    #[error("ledger invariant violated: {reason}")]
    InvariantViolation { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ZonetraderError {
    pub fn data_format(source_name: impl Into<String>, reason: impl ToString) -> Self {
        ZonetraderError::DataFormat {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<&ZonetraderError> for std::process::ExitCode {
    fn from(err: &ZonetraderError) -> Self {
        let code: u8 = match err {
            ZonetraderError::Io(_) => 1,
            ZonetraderError::ConfigParse { .. }
            | ZonetraderError::ConfigMissing { .. }
            | ZonetraderError::ConfigInvalid { .. } => 2,
            ZonetraderError::Database { .. } | ZonetraderError::DatabaseQuery { .. } => 3,
            ZonetraderError::DataFormat { .. }
            | ZonetraderError::NoData { .. }
            | ZonetraderError::InvalidPivots { .. }
            | ZonetraderError::MembershipOverlap { .. } => 5,
            ZonetraderError::InvariantViolation { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
