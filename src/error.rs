use std::fs::File;
use std::io::BufReader;

/// Error types that can occur while building or stepping a recurrent cell
///
/// # Variants
///
/// - `ShapeInferenceError` - The input feature width could not be inferred from the input tensor
/// - `InputValidationError` - The input data or configuration does not meet the expected format, type, or validation rules
/// - `ProcessingError` - Something went wrong while processing (for example an internal reshape)
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    ShapeInferenceError(String),
    InputValidationError(String),
    ProcessingError(String),
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::ShapeInferenceError(msg) => write!(f, "Shape inference error: {}", msg),
            ModelError::InputValidationError(msg) => write!(f, "Input validation error: {}", msg),
            ModelError::ProcessingError(msg) => write!(f, "Processing error: {}", msg),
        }
    }
}

impl std::error::Error for ModelError {}

impl From<ndarray::ShapeError> for ModelError {
    fn from(e: ndarray::ShapeError) -> Self {
        ModelError::ProcessingError(e.to_string())
    }
}

/// Input/Output error types that can occur while saving or restoring a variable store
///
/// # Variants
///
/// - `StdIoError` - Wraps standard I/O errors from file system operations
/// - `JsonError` - Wraps JSON serialization/deserialization errors
/// - `ModelError` - The snapshot was read but describes an invalid store
#[derive(Debug)]
pub enum IoError {
    StdIoError(std::io::Error),
    JsonError(serde_json::Error),
    ModelError(ModelError),
}

impl IoError {
    pub fn load_in_buf_reader(path: &str) -> Result<BufReader<File>, IoError> {
        let file = File::open(path).map_err(IoError::StdIoError)?;
        Ok(BufReader::new(file))
    }
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoError::StdIoError(e) => write!(f, "IO error: {}", e),
            IoError::JsonError(e) => write!(f, "JSON error: {}", e),
            IoError::ModelError(e) => write!(f, "Invalid snapshot: {}", e),
        }
    }
}

impl std::error::Error for IoError {}

impl From<ModelError> for IoError {
    fn from(e: ModelError) -> Self {
        IoError::ModelError(e)
    }
}
