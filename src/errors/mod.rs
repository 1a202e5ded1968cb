pub mod api_error;
pub mod client_error;

pub use api_error::{ApiError, ApiErrorDetail, ValidationError, ValidationErrorItem};
pub use client_error::{ClientError, ClientResult};
