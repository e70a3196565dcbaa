pub mod audit;
pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod paths;
pub mod planner;
pub mod progress;
pub mod registry;
pub mod store;
pub mod tools;
pub mod watch;

pub use error::TaskError;
