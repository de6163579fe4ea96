pub mod config;
pub mod error;
pub mod job;
pub mod outcome;
pub mod provider;
pub mod retime;
pub mod session;

// Re-export common error type
pub use error::AgelineError;
pub use outcome::Outcome;
