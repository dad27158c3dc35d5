//! In-memory collaborators for exercising the rotation engine.
//!
//! Available with the `testing` feature or during tests:
//!
//! ```toml
//! [dev-dependencies]
//! rotation = { path = "../rotation", features = ["testing"] }
//! ```

mod backend;
mod clock;

pub use backend::InMemoryBackend;
pub use clock::FixedClock;
