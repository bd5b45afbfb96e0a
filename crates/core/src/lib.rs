//! benchplan core data models.
//!
//! This crate defines the job catalog, results and machine facts shared by
//! the scheduler crates.

#![warn(missing_docs)]

mod id;
mod job;
mod result;
mod record;
mod testplan;
mod catalog;
mod interaction;

pub use id::{slugify, JobId, SessionId, TestPlanId, NAMESPACE_SEPARATOR};
pub use job::{JobDefinition, JobPlugin};
pub use result::{JobResult, Outcome};
pub use record::{parse_rfc822, RecordSyntaxError, ResourceMap, ResourceRecord};
pub use testplan::TestPlan;
pub use catalog::{Catalog, CatalogError};
pub use interaction::{Interaction, InteractionKind};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
