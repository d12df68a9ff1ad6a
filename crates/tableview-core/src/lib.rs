pub mod error;
pub mod record;
pub mod schema;

pub use error::{Error, Result};
pub use record::Message;
pub use schema::{BytesSchema, Int32Schema, JsonSchema, Schema, StringSchema};
