pub mod api;
pub mod error;
pub mod events;
pub mod serialize;
pub mod transport;
pub mod types;

pub use error::{SchemaError, WireError};
pub use serialize::{Codec, UnknownFields};
pub use transport::UnixSocketTransport;
