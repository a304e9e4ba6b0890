use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Seasonal weight table is invalid: {0}")]
    InvalidSeasonalWeights(String),

    #[error("Missing required field '{0}'")]
    MissingField(String),

    #[error("Unparseable date value: {0}")]
    UnparseableDate(String),

    #[error("Invalid fiscal month index {0}: must be between 0 (August) and 11 (July)")]
    InvalidMonthIndex(usize),

    #[error("Invalid calendar month {0}: must be between 1 and 12")]
    InvalidCalendarMonth(u32),

    #[error("Monthly targets for {month}/{year} cannot be entered before the month starts")]
    MonthLocked { year: i32, month: u32 },

    #[error("Class type '{class_type}' is not selectable for the current branch")]
    ClassNotSelectable { class_type: String },

    #[error("Branch '{0}' is outside the user's scope")]
    BranchNotVisible(String),

    #[error("Record '{0}' does not exist")]
    RecordNotFound(String),

    #[error("Write batch of {size} operations exceeds the store limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("Batch #{batch} failed after {committed} records were committed: {message}")]
    BatchFailed {
        batch: usize,
        committed: usize,
        message: String,
    },

    #[error("Document {collection}/{id} is malformed: {details}")]
    MalformedDocument {
        collection: String,
        id: String,
        details: String,
    },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
