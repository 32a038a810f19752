mod error;
pub use error::{Error, IntoError};

pub mod cache;
pub use cache::SchemaCache;

pub mod mapper;

pub mod schema;
pub use schema::{Field, FieldType, Schema};

pub mod value;
pub use value::{Point, Value};

/// A Result type alias that uses the adapter's [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;

/// A document as exchanged with the hosting platform: a JSON object keyed by
/// field name, in encounter order.
pub type Document = serde_json::Map<String, serde_json::Value>;

pub use async_trait::async_trait;
