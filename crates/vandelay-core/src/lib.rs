pub mod compose;
pub mod config;
pub mod error;
pub mod graph;
pub mod io;
pub mod mode;
pub mod paths;
pub mod permission;
pub mod plan;
pub mod resource;
pub mod schedule;
pub mod secret;
pub mod types;

pub use compose::{compose, compose_into, Composition};
pub use error::{Result, VandelayError};
