pub mod archive;
pub mod audit;
pub mod census;
pub mod comments;
pub mod document;
pub mod error;
pub mod github;
pub mod io;
pub mod prune;
pub mod resource;
pub mod signals;
pub mod store;
pub mod transition;
pub mod types;

pub use error::{Result, SweepError};
