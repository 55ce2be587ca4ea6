pub mod connection;
pub mod message;

pub use connection::{ConnectionStage, ConnectionState};
pub use message::{MessageKind, ProtocolVersion};
