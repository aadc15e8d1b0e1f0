//! Mock device implementations for testing and development.
//!
//! Each mock is created together with a handle that controls it from the
//! outside. The handle is cheap to clone and can be kept by a test while the
//! device itself is moved into a channel worker.

pub mod indicator;
pub mod input;

pub use indicator::{MockIndicator, MockIndicatorHandle};
pub use input::{MockInput, MockInputHandle};
