mod message;
mod reader;
mod schema;
mod timestamp;
mod types;
mod writer;

pub use message::*;
pub use reader::HarReader;
pub use schema::{Field, FieldKind, HarEntity, KeyValue, Schema, Source, find, shape};
pub use timestamp::Timestamp;
pub use types::*;
pub use writer::{EncodeOptions, HarWriter};
