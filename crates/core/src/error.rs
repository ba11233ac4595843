#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unsupported value for {field}: '{value}'")]
    Unsupported { field: &'static str, value: String },

    #[error("Invalid stage transition: {operation} is not allowed from {from}")]
    InvalidTransition {
        operation: &'static str,
        from: crate::workflow::Stage,
    },
}
