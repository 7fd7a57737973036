//! Sensor-process pieces: the reading source, the shutdown hook and the
//! loop tying them to the safety checks and the bus.

mod sensor;
mod shutdown;
mod source;

pub use sensor::SensorNode;
pub use shutdown::{ScriptShutdown, ShutdownAction};
pub use source::{parse_sample, CommandSource, ReadingSource};
