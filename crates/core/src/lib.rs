//! Terms-of-Service analyzer core: input acquisition, the submission
//! lifecycle against the remote classification service, and the result
//! presentation rules.

pub mod domain;
pub mod infra;
pub mod usecase;
