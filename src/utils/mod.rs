pub mod base64_bytes;
pub mod error;
pub mod logger;
pub mod validation;
