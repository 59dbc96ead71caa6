pub mod document;
pub mod email;
pub mod path;

pub use document::{Document, DocumentEventData, Value, document_relative_path};
pub use email::{EmailError, EmailKey, EmailRecord};
pub use path::{PathError, PathParams, PathTemplate};
