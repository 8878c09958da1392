//! Wire types exchanged with the orchestration server
//!
//! Tasks arrive from batch polls; results travel back through the
//! update endpoints. Field names follow the server's camelCase JSON.

mod result;
mod task;

pub use result::*;
pub use task::*;
