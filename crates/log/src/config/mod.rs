//! Configuration types
//!
//! - `base`: core configuration structs (Config, Format, Level)
//! - `writer`: writer and display configuration
//! - `fields`: global fields attached to a root span
//! - `presets`: development, production and test setups

mod base;
mod fields;
mod presets;
mod writer;

pub use base::{Config, Format, Level};
pub use fields::Fields;
pub use writer::{DisplayConfig, WriterConfig};
