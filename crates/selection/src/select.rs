//! Turning qualifiers into a concrete job list.

use std::collections::HashSet;
use std::sync::Arc;

use benchplan_core::{JobDefinition, JobId};

use crate::qualifier::{flatten, Qualifier, Vote};

/// Select jobs voted in by `qualifiers`.
///
/// Jobs are returned in the order qualifiers first include them, not in
/// catalog order. A single exclude vote from any qualifier removes a job no
/// matter where that qualifier sits in the list.
pub fn select_jobs(
    jobs: &[Arc<JobDefinition>],
    qualifiers: &[Qualifier],
) -> Vec<Arc<JobDefinition>> {
    let primitives = flatten(qualifiers);
    if primitives.is_empty() {
        return Vec::new();
    }

    let mut included: Vec<&Arc<JobDefinition>> = Vec::new();
    let mut included_ids: HashSet<&JobId> = HashSet::new();
    let mut excluded: HashSet<&JobId> = HashSet::new();

    for qualifier in &primitives {
        for job in jobs {
            match qualifier.vote(job) {
                Vote::Include => {
                    if included_ids.insert(&job.id) {
                        included.push(job);
                    }
                }
                Vote::Exclude => {
                    excluded.insert(&job.id);
                }
                Vote::Ignore => {}
            }
        }
    }

    included
        .into_iter()
        .filter(|job| !excluded.contains(&job.id))
        .cloned()
        .collect()
}
