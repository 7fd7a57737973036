//! Topic-less, unacknowledged alert bus over loopback TCP.
//!
//! One process binds (the notifier), any number connect (sensor nodes). Each
//! message is a single UTF-8 line. There is no replay: whatever is published
//! while nobody is bound is gone.

mod listener;
mod publisher;

pub use listener::BusListener;
pub use publisher::AlertPublisher;

pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:5556";
