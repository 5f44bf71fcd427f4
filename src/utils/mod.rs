pub mod url_validator;

pub use url_validator::{
    UrlValidationError, ValidatedUrl, is_minimally_safe, validate_external_url,
    validation_error_message,
};
