//! Line source: follows a growing access log and yields complete lines.

mod tailer;

pub use tailer::{LineTailer, TailerConfig};
