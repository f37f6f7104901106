pub mod errors;
pub mod profile;
pub mod protocol;

pub use errors::{ConnError, SessionError};
pub use profile::{new_id, Profile};
pub use protocol::{ClientHello, MatchMessage, MessageKind};
