//! Qualifier and selection engine for benchplan.
//!
//! Qualifiers vote `Include`, `Exclude` or `Ignore` on each job;
//! [`select_jobs`] turns a list of them into an ordered job list.

#![warn(missing_docs)]

mod error;
pub mod pattern_list;
pub mod qualifier;
pub mod select;
pub mod testplan;

pub use error::{Result, SelectionError};
pub use pattern_list::parse_pattern_list;
pub use qualifier::{flatten, JobField, Matcher, Origin, Qualifier, SimpleQualifier, Vote};
pub use select::select_jobs;
pub use testplan::Overrides;
