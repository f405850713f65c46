//! Task definitions routed through the fallback orchestrator.
//!
//! Each task decides how to phrase its request for a given provider, how to
//! normalize the reply, and what its terminal answer is.

mod chat;
mod diagnosis;
mod live;
mod safety;
mod tip;

pub use chat::*;
pub use diagnosis::*;
pub use live::*;
pub use safety::*;
pub use tip::*;
