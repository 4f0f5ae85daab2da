//! Lead persistence and claims.

pub mod claims;
pub mod model;
pub mod store;

pub use claims::ClaimService;
pub use model::{Lead, LeadFields, LeadStatus, OperatorId};
pub use store::{JsonFileLeadStore, LeadStore};
