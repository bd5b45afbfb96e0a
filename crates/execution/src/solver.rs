//! Dependency resolution for jobs.
//!
//! The solver walks the dependency graph depth-first, colouring nodes white
//! (unvisited), gray (on the current path) and black (done). Reaching a gray
//! node closes a cycle. Black nodes are appended to the run list after their
//! dependencies, so the result is a topological order that starts from the
//! visit list and pulls in everything it needs.

use std::collections::HashMap;
use std::fmt;

use benchplan_core::JobId;

/// How one job depends on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    /// `depends`: must run and pass first
    Direct,
    /// `after`: must run first, outcome ignored
    Ordering,
    /// Referenced by a requirement expression
    Resource,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DependencyKind::Direct => "direct",
            DependencyKind::Ordering => "ordering",
            DependencyKind::Resource => "resource",
        };
        f.write_str(s)
    }
}

/// One outgoing edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Edge kind
    pub kind: DependencyKind,
    /// Job depended upon
    pub target: JobId,
}

/// Dependency problems found while building a run list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DependencyError {
    /// A job refers to a job that does not exist
    #[error("missing {kind} dependency {dependency} of job {job}")]
    Missing {
        /// Job with the dangling reference
        job: JobId,
        /// Referenced job
        dependency: JobId,
        /// Edge kind
        kind: DependencyKind,
    },

    /// Jobs depend on each other
    #[error("dependency cycle detected: {}", format_cycle(.0))]
    Cycle(Vec<JobId>),

    /// A job in the visit list is not known
    #[error("unknown job {0}")]
    Unknown(JobId),
}

fn format_cycle(path: &[JobId]) -> String {
    path.iter()
        .map(JobId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl DependencyError {
    /// The job that has to go for the rest to be solvable.
    pub fn affected_job(&self) -> &JobId {
        match self {
            DependencyError::Missing { job, .. } => job,
            // a cycle path always holds at least the repeated node twice
            DependencyError::Cycle(path) => &path[0],
            DependencyError::Unknown(job) => job,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// A dependency graph.
#[derive(Debug, Clone, Default)]
pub struct DepGraph {
    /// job -> [dependencies]
    edges: HashMap<JobId, Vec<Dependency>>,
}

impl DepGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job with its outgoing edges.
    pub fn insert(&mut self, job: JobId, deps: Vec<Dependency>) {
        self.edges.insert(job, deps);
    }

    /// Forget a job. Anything depending on it becomes unsolvable.
    pub fn remove(&mut self, job: &JobId) {
        self.edges.remove(job);
    }

    /// Whether the job is in the graph.
    pub fn contains(&self, job: &JobId) -> bool {
        self.edges.contains_key(job)
    }

    /// Run list for `visit_list`: each job preceded by everything it needs.
    pub fn resolve(&self, visit_list: &[JobId]) -> Result<Vec<JobId>, DependencyError> {
        let mut color: HashMap<&JobId, Color> =
            self.edges.keys().map(|id| (id, Color::White)).collect();
        let mut solution = Vec::new();

        for job in visit_list {
            let Some((key, _)) = self.edges.get_key_value(job) else {
                return Err(DependencyError::Unknown(job.clone()));
            };
            if color.get(key) == Some(&Color::White) {
                let mut trail = Vec::new();
                self.visit(key, &mut color, &mut trail, &mut solution)?;
            }
        }
        Ok(solution)
    }

    fn visit<'a>(
        &'a self,
        job: &'a JobId,
        color: &mut HashMap<&'a JobId, Color>,
        trail: &mut Vec<&'a JobId>,
        solution: &mut Vec<JobId>,
    ) -> Result<(), DependencyError> {
        color.insert(job, Color::Gray);
        trail.push(job);

        for dep in self.edges.get(job).into_iter().flatten() {
            match color.get(&dep.target).copied() {
                None => {
                    return Err(DependencyError::Missing {
                        job: job.clone(),
                        dependency: dep.target.clone(),
                        kind: dep.kind,
                    });
                }
                Some(Color::Gray) => {
                    let start = trail
                        .iter()
                        .position(|id| **id == dep.target)
                        .unwrap_or(0);
                    let mut path: Vec<JobId> =
                        trail[start..].iter().map(|id| (*id).clone()).collect();
                    path.push(dep.target.clone());
                    return Err(DependencyError::Cycle(path));
                }
                Some(Color::White) => self.visit(&dep.target, color, trail, solution)?,
                Some(Color::Black) => {}
            }
        }

        trail.pop();
        color.insert(job, Color::Black);
        solution.push(job.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> JobId {
        JobId::new(s)
    }

    fn direct(s: &str) -> Dependency {
        Dependency {
            kind: DependencyKind::Direct,
            target: id(s),
        }
    }

    #[test]
    fn test_dependencies_come_first() {
        let mut graph = DepGraph::new();
        graph.insert(id("a"), vec![direct("b")]);
        graph.insert(id("b"), vec![direct("c")]);
        graph.insert(id("c"), vec![]);
        graph.insert(id("d"), vec![]);

        let run_list = graph.resolve(&[id("d"), id("a")]).unwrap();
        assert_eq!(run_list, vec![id("d"), id("c"), id("b"), id("a")]);
    }

    #[test]
    fn test_shared_dependency_listed_once() {
        let mut graph = DepGraph::new();
        graph.insert(id("a"), vec![direct("r")]);
        graph.insert(id("b"), vec![direct("r")]);
        graph.insert(id("r"), vec![]);
        let run_list = graph.resolve(&[id("a"), id("b")]).unwrap();
        assert_eq!(run_list, vec![id("r"), id("a"), id("b")]);
    }

    #[test]
    fn test_missing() {
        let mut graph = DepGraph::new();
        graph.insert(
            id("a"),
            vec![Dependency {
                kind: DependencyKind::Resource,
                target: id("gone"),
            }],
        );
        let err = graph.resolve(&[id("a")]).unwrap_err();
        assert_eq!(
            err,
            DependencyError::Missing {
                job: id("a"),
                dependency: id("gone"),
                kind: DependencyKind::Resource,
            }
        );
        assert_eq!(err.affected_job(), &id("a"));
    }

    #[test]
    fn test_cycle() {
        let mut graph = DepGraph::new();
        graph.insert(id("x"), vec![direct("a")]);
        graph.insert(id("a"), vec![direct("b")]);
        graph.insert(id("b"), vec![direct("a")]);
        let err = graph.resolve(&[id("x")]).unwrap_err();
        assert_eq!(err, DependencyError::Cycle(vec![id("a"), id("b"), id("a")]));
        assert_eq!(err.to_string(), "dependency cycle detected: a -> b -> a");
        assert_eq!(err.affected_job(), &id("a"));
    }

    #[test]
    fn test_unknown() {
        let graph = DepGraph::new();
        assert_eq!(
            graph.resolve(&[id("nope")]),
            Err(DependencyError::Unknown(id("nope")))
        );
    }
}
