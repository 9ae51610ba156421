pub mod connection;
pub mod data_channel;
pub mod track;
pub mod types;

pub use connection::new_peer;
pub use data_channel::{create_channel, CHANNEL_LABEL};
pub use types::{ChannelEvent, EphemeralSession};
