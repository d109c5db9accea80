pub mod analysis;
pub mod error;
pub mod input;
pub mod report;
pub mod session;
pub mod settings;
