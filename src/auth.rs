//! Token material: redacted secrets, normalized scope sets, and cached token state.

pub mod scope;
pub mod secret;
pub mod state;

pub use scope::*;
pub use secret::*;
pub use state::*;
