pub mod graph;
pub mod hotspot;
pub mod picking;

pub use graph::*;
pub use hotspot::*;
pub use picking::*;
