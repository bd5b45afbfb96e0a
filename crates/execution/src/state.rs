//! Session state: job states, the resource map and the desired job list.
//!
//! Readiness is recomputed from scratch whenever the desired list changes or
//! a result is recorded; there is no separate ready queue.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use benchplan_core::{
    parse_rfc822, JobDefinition, JobId, JobResult, Outcome, ResourceMap, ResourceRecord,
};
use benchplan_resource::{EvaluationError, ProgramError, ResourceProgram};
use benchplan_selection::Overrides;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SessionError};
use crate::inhibitor::{InhibitorCause, JobReadinessInhibitor};
use crate::job_state::JobState;
use crate::metadata::SessionMetadata;
use crate::solver::{DepGraph, Dependency, DependencyError, DependencyKind};

/// A job whose requirement program does not compile.
#[derive(Debug, Clone, PartialEq)]
pub struct DefinitionProblem {
    /// Offending job
    pub job_id: JobId,
    /// Compilation error
    pub error: ProgramError,
}

/// How far a session has got.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Jobs with a result
    pub done: usize,
    /// Jobs in the run list
    pub total: usize,
}

/// All mutable state of one session.
#[derive(Debug, Clone)]
pub struct SessionState {
    job_list: Vec<Arc<JobDefinition>>,
    job_state_map: HashMap<JobId, JobState>,
    graph: DepGraph,
    mandatory_job_list: Vec<JobId>,
    desired_job_list: Vec<JobId>,
    run_list: Vec<JobId>,
    resource_map: ResourceMap,
    metadata: SessionMetadata,
    definition_problems: Vec<DefinitionProblem>,
}

impl SessionState {
    /// Build the state for a catalog. Jobs whose requirement program does not
    /// compile stay undesired forever and are listed in
    /// [`definition_problems`](Self::definition_problems).
    pub fn new(job_list: Vec<Arc<JobDefinition>>) -> Self {
        let mut job_state_map = HashMap::with_capacity(job_list.len());
        let mut graph = DepGraph::new();
        let mut definition_problems = Vec::new();

        for job in &job_list {
            let program = match &job.requires {
                Some(text) => match ResourceProgram::from_text_with_imports(
                    text,
                    job.namespace(),
                    job.imports.as_deref(),
                ) {
                    Ok(program) => Some(Arc::new(program)),
                    Err(error) => {
                        warn!(job_id = %job.id, error = %error, "invalid requirement program");
                        definition_problems.push(DefinitionProblem {
                            job_id: job.id.clone(),
                            error,
                        });
                        job_state_map.insert(job.id.clone(), JobState::new(job.clone(), None));
                        continue;
                    }
                },
                None => None,
            };
            graph.insert(job.id.clone(), edges(job, program.as_deref()));
            job_state_map.insert(job.id.clone(), JobState::new(job.clone(), program));
        }

        Self {
            job_list,
            job_state_map,
            graph,
            mandatory_job_list: Vec::new(),
            desired_job_list: Vec::new(),
            run_list: Vec::new(),
            resource_map: ResourceMap::new(),
            metadata: SessionMetadata::default(),
            definition_problems,
        }
    }

    /// Catalog jobs in catalog order.
    pub fn job_list(&self) -> &[Arc<JobDefinition>] {
        &self.job_list
    }

    /// Look up a job definition.
    pub fn job(&self, id: &JobId) -> Option<&Arc<JobDefinition>> {
        self.job_state_map.get(id).map(JobState::job)
    }

    /// State of one job.
    pub fn job_state(&self, id: &JobId) -> Option<&JobState> {
        self.job_state_map.get(id)
    }

    /// Mutable state of one job.
    pub fn job_state_mut(&mut self, id: &JobId) -> Option<&mut JobState> {
        self.job_state_map.get_mut(id)
    }

    /// All job states.
    pub fn job_state_map(&self) -> &HashMap<JobId, JobState> {
        &self.job_state_map
    }

    /// Jobs that always run, in order.
    pub fn mandatory_job_list(&self) -> &[JobId] {
        &self.mandatory_job_list
    }

    /// Mandatory jobs followed by the requested ones, minus unsolvable jobs.
    pub fn desired_job_list(&self) -> &[JobId] {
        &self.desired_job_list
    }

    /// Desired jobs plus their dependencies, in execution order.
    pub fn run_list(&self) -> &[JobId] {
        &self.run_list
    }

    /// Records produced by resource jobs.
    pub fn resource_map(&self) -> &ResourceMap {
        &self.resource_map
    }

    /// Session metadata.
    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    /// Mutable session metadata.
    pub fn metadata_mut(&mut self) -> &mut SessionMetadata {
        &mut self.metadata
    }

    /// Jobs rejected at load time.
    pub fn definition_problems(&self) -> &[DefinitionProblem] {
        &self.definition_problems
    }

    /// Set the jobs that are always prepended to the desired list. Takes
    /// effect on the next [`update_desired_job_list`](Self::update_desired_job_list).
    pub fn update_mandatory_job_list(&mut self, mandatory: Vec<JobId>) {
        self.mandatory_job_list = mandatory;
    }

    /// Replace the desired job list and recompute the run list and readiness.
    ///
    /// Jobs that make the list unsolvable are dropped one at a time until the
    /// rest resolves; every dropped job is reported in the returned list.
    pub fn update_desired_job_list(&mut self, desired: Vec<JobId>) -> Vec<DependencyError> {
        let mut seen = HashSet::new();
        let mut visit: Vec<JobId> = self
            .mandatory_job_list
            .iter()
            .chain(desired.iter())
            .filter(|id| seen.insert((*id).clone()))
            .cloned()
            .collect();

        let mut graph = self.graph.clone();
        let mut problems = Vec::new();
        let run_list = loop {
            match graph.resolve(&visit) {
                Ok(run_list) => break run_list,
                Err(problem) => {
                    let affected = problem.affected_job().clone();
                    warn!(job_id = %affected, error = %problem, "dropping job from the desired list");
                    graph.remove(&affected);
                    visit.retain(|id| *id != affected);
                    problems.push(problem);
                }
            }
        };

        debug!(desired = visit.len(), run_list = run_list.len(), "updated desired job list");
        self.desired_job_list = visit;
        self.run_list = run_list;
        self.update_readiness();
        problems
    }

    /// Recompute the inhibitors of every job.
    pub fn update_readiness(&mut self) {
        let in_run_list: HashSet<&JobId> = self.run_list.iter().collect();
        let updates: Vec<(JobId, Vec<JobReadinessInhibitor>)> = self
            .job_list
            .iter()
            .filter_map(|job| self.job_state_map.get(&job.id))
            .map(|state| {
                let id = &state.job().id;
                let inhibitors = if in_run_list.contains(id) {
                    self.compute_inhibitors(state)
                } else {
                    vec![JobReadinessInhibitor::undesired()]
                };
                (id.clone(), inhibitors)
            })
            .collect();

        for (id, inhibitors) in updates {
            if let Some(state) = self.job_state_map.get_mut(&id) {
                if !inhibitors.is_empty() && inhibitors[0].cause() != InhibitorCause::Undesired {
                    debug!(job_id = %id, inhibitors = inhibitors.len(), "job is inhibited");
                }
                state.set_readiness_inhibitors(inhibitors);
            }
        }
    }

    fn compute_inhibitors(&self, state: &JobState) -> Vec<JobReadinessInhibitor> {
        let job = state.job();
        let mut inhibitors = Vec::new();

        for dep in &job.depends {
            let Some(dep_state) = self.job_state_map.get(dep) else {
                continue;
            };
            if !dep_state.has_run() {
                inhibitors.push(JobReadinessInhibitor::pending_dep(dep.clone()));
            } else if dep_state.outcome() != Some(Outcome::Pass) {
                inhibitors.push(JobReadinessInhibitor::failed_dep(dep.clone()));
            }
        }

        for dep in &job.after {
            let ran = self
                .job_state_map
                .get(dep)
                .map(JobState::has_run)
                .unwrap_or(true);
            if !ran {
                inhibitors.push(JobReadinessInhibitor::pending_dep(dep.clone()));
            }
        }

        if let Some(program) = state.program() {
            for failure in program.failures(&self.resource_map) {
                inhibitors.push(match failure {
                    EvaluationError::CannotEvaluate {
                        resource_id,
                        expression,
                    } => JobReadinessInhibitor::pending_resource(resource_id, expression),
                    EvaluationError::PredicateFailed {
                        resource_id,
                        expression,
                    } => JobReadinessInhibitor::failed_resource(resource_id, expression),
                });
            }
        }
        inhibitors
    }

    /// Record a result and recompute readiness.
    ///
    /// Hollow results are ignored. Results of resource jobs replace the
    /// job's records in the resource map. Returns whether anything changed.
    pub fn update_job_result(&mut self, id: &JobId, result: JobResult) -> Result<bool> {
        let state = self
            .job_state_map
            .get_mut(id)
            .ok_or_else(|| SessionError::UnknownJob(id.clone()))?;
        let resource_output = state.job().is_resource().then(|| result.stdout.clone());
        let outcome = result.outcome;
        if !state.record_result(result) {
            debug!(job_id = %id, "ignoring hollow result");
            return Ok(false);
        }
        state.set_attempts(state.attempts().saturating_sub(1));
        debug!(job_id = %id, outcome = ?outcome, "recorded job result");

        if let Some(output) = resource_output {
            match parse_rfc822(&output) {
                Ok(records) => self.set_resource_list(id.clone(), records),
                Err(error) => {
                    warn!(job_id = %id, error = %error, "cannot parse resource output, keeping previous records");
                }
            }
        }
        self.update_readiness();
        Ok(true)
    }

    /// Replace the records of one resource.
    pub fn set_resource_list(&mut self, id: JobId, records: Vec<ResourceRecord>) {
        debug!(job_id = %id, records = records.len(), "updated resource records");
        self.resource_map.insert(id, records);
    }

    pub(crate) fn restore_job(&mut self, id: &JobId, history: Vec<JobResult>, attempts: u32) -> Result<()> {
        let state = self
            .job_state_map
            .get_mut(id)
            .ok_or_else(|| SessionError::UnknownJob(id.clone()))?;
        state.set_result_history(history);
        state.set_attempts(attempts);
        Ok(())
    }

    pub(crate) fn restore_resource_map(&mut self, resource_map: ResourceMap) {
        self.resource_map = resource_map;
    }

    /// Apply test plan overrides to every job.
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        for state in self.job_state_map.values_mut() {
            state.apply_overrides(overrides);
        }
        debug!("applied test plan overrides");
    }

    /// Give every job the same number of attempts.
    pub fn reset_attempts(&mut self, attempts: u32) {
        for state in self.job_state_map.values_mut() {
            state.set_attempts(attempts);
        }
    }

    /// Run list jobs without a result yet, in execution order.
    pub fn todo_list(&self) -> Vec<JobId> {
        self.run_list
            .iter()
            .filter(|id| {
                self.job_state_map
                    .get(*id)
                    .map(|s| !s.has_run())
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Number of run list jobs per latest outcome.
    pub fn get_outcome_stats(&self) -> BTreeMap<Outcome, usize> {
        let mut stats = BTreeMap::new();
        for id in &self.run_list {
            if let Some(outcome) = self.job_state_map.get(id).and_then(JobState::outcome) {
                *stats.entry(outcome).or_insert(0) += 1;
            }
        }
        stats
    }

    /// Done and total counts over the run list.
    pub fn progress(&self) -> Progress {
        Progress {
            done: self.run_list.len() - self.todo_list().len(),
            total: self.run_list.len(),
        }
    }

    /// Outcome for a job that will not be run because it cannot start:
    /// `skip` when a failed dependency was itself skipped, else `not-supported`.
    pub fn blocked_outcome(&self, id: &JobId) -> Outcome {
        let skipped_dep = self
            .job_state_map
            .get(id)
            .map(|state| {
                state
                    .readiness_inhibitors()
                    .iter()
                    .filter(|i| i.cause() == InhibitorCause::FailedDep)
                    .filter_map(|i| i.related_job())
                    .any(|dep| {
                        self.job_state_map.get(dep).and_then(JobState::outcome)
                            == Some(Outcome::Skip)
                    })
            })
            .unwrap_or(false);
        if skipped_dep {
            Outcome::Skip
        } else {
            Outcome::NotSupported
        }
    }
}

fn edges(job: &JobDefinition, program: Option<&ResourceProgram>) -> Vec<Dependency> {
    let direct = job.depends.iter().map(|id| Dependency {
        kind: DependencyKind::Direct,
        target: id.clone(),
    });
    let ordering = job.after.iter().map(|id| Dependency {
        kind: DependencyKind::Ordering,
        target: id.clone(),
    });
    let resource = program
        .into_iter()
        .flat_map(|p| p.required_resources().iter())
        .map(|id| Dependency {
            kind: DependencyKind::Resource,
            target: id.clone(),
        });
    direct.chain(ordering).chain(resource).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchplan_core::JobPlugin;

    fn id(s: &str) -> JobId {
        JobId::new(s)
    }

    fn state(jobs: Vec<JobDefinition>) -> SessionState {
        SessionState::new(jobs.into_iter().map(Arc::new).collect())
    }

    fn causes(state: &SessionState, job: &str) -> Vec<InhibitorCause> {
        state
            .job_state(&id(job))
            .unwrap()
            .readiness_inhibitors()
            .iter()
            .map(|i| i.cause())
            .collect()
    }

    fn pass() -> JobResult {
        JobResult::with_outcome(Outcome::Pass)
    }

    #[test]
    fn test_desired_job_without_dependencies_can_start() {
        let mut s = state(vec![
            JobDefinition::new("ns::a", Some("true")),
            JobDefinition::new("ns::b", Some("true")),
        ]);
        assert!(s.update_desired_job_list(vec![id("ns::a")]).is_empty());
        assert!(s.job_state(&id("ns::a")).unwrap().can_start());
        assert_eq!(causes(&s, "ns::b"), vec![InhibitorCause::Undesired]);

        s.update_desired_job_list(vec![id("ns::b")]);
        assert_eq!(causes(&s, "ns::a"), vec![InhibitorCause::Undesired]);
    }

    #[test]
    fn test_dependency_pending_then_failed() {
        let mut s = state(vec![
            JobDefinition::new("ns::a", Some("true")).with_depends("ns::b"),
            JobDefinition::new("ns::b", Some("false")),
        ]);
        s.update_desired_job_list(vec![id("ns::a")]);
        assert_eq!(s.run_list(), &[id("ns::b"), id("ns::a")]);
        assert_eq!(causes(&s, "ns::a"), vec![InhibitorCause::PendingDep]);

        s.update_job_result(&id("ns::b"), JobResult::with_outcome(Outcome::Fail))
            .unwrap();
        assert_eq!(causes(&s, "ns::a"), vec![InhibitorCause::FailedDep]);
        assert_eq!(s.blocked_outcome(&id("ns::a")), Outcome::NotSupported);

        s.update_job_result(&id("ns::b"), pass()).unwrap();
        assert!(s.job_state(&id("ns::a")).unwrap().can_start());
    }

    #[test]
    fn test_skipped_dependency_skips_dependent() {
        let mut s = state(vec![
            JobDefinition::new("ns::a", Some("true")).with_depends("ns::b"),
            JobDefinition::new("ns::b", None).with_plugin(JobPlugin::Manual),
        ]);
        s.update_desired_job_list(vec![id("ns::a")]);
        s.update_job_result(&id("ns::b"), JobResult::with_outcome(Outcome::Skip))
            .unwrap();
        assert_eq!(s.blocked_outcome(&id("ns::a")), Outcome::Skip);
    }

    #[test]
    fn test_after_dependency_never_fails() {
        let mut s = state(vec![
            JobDefinition::new("ns::a", Some("true")).with_after("ns::b"),
            JobDefinition::new("ns::b", Some("false")),
        ]);
        s.update_desired_job_list(vec![id("ns::a")]);
        assert_eq!(causes(&s, "ns::a"), vec![InhibitorCause::PendingDep]);
        s.update_job_result(&id("ns::b"), JobResult::with_outcome(Outcome::Fail))
            .unwrap();
        assert!(causes(&s, "ns::a").is_empty());
    }

    #[test]
    fn test_resource_pending_failed_and_met() {
        let mut s = state(vec![
            JobDefinition::new("ns::a", Some("true")).with_requires("device.category == 'AUDIO'"),
            JobDefinition::new("ns::device", Some("lsdev")).with_plugin(JobPlugin::Resource),
        ]);
        s.update_desired_job_list(vec![id("ns::a")]);
        assert_eq!(s.run_list(), &[id("ns::device"), id("ns::a")]);
        assert_eq!(causes(&s, "ns::a"), vec![InhibitorCause::PendingResource]);

        let mut result = pass();
        result.stdout = "category: VIDEO\n\ncategory: NETWORK\n".to_string();
        s.update_job_result(&id("ns::device"), result).unwrap();
        assert_eq!(s.resource_map()[&id("ns::device")].len(), 2);
        assert_eq!(causes(&s, "ns::a"), vec![InhibitorCause::FailedResource]);
        let inhibitor = &s.job_state(&id("ns::a")).unwrap().readiness_inhibitors()[0];
        assert_eq!(inhibitor.related_expression(), Some("device.category == 'AUDIO'"));

        let mut result = pass();
        result.stdout = "category: AUDIO\n".to_string();
        s.update_job_result(&id("ns::device"), result).unwrap();
        assert!(causes(&s, "ns::a").is_empty());
    }

    #[test]
    fn test_hollow_result_changes_nothing() {
        let mut s = state(vec![JobDefinition::new("ns::a", Some("true"))]);
        s.update_desired_job_list(vec![id("ns::a")]);
        assert!(!s.update_job_result(&id("ns::a"), JobResult::default()).unwrap());
        assert_eq!(s.todo_list(), vec![id("ns::a")]);
        assert!(matches!(
            s.update_job_result(&id("ns::zz"), pass()),
            Err(SessionError::UnknownJob(_))
        ));
    }

    #[test]
    fn test_unsolvable_jobs_are_dropped() {
        let mut s = state(vec![
            JobDefinition::new("ns::ok", Some("true")),
            JobDefinition::new("ns::dangling", Some("true")).with_depends("ns::gone"),
            JobDefinition::new("ns::x", Some("true")).with_depends("ns::y"),
            JobDefinition::new("ns::y", Some("true")).with_depends("ns::x"),
        ]);
        let problems =
            s.update_desired_job_list(vec![id("ns::dangling"), id("ns::ok"), id("ns::x")]);
        assert_eq!(problems.len(), 2);
        assert!(matches!(problems[0], DependencyError::Missing { .. }));
        assert!(matches!(problems[1], DependencyError::Cycle(_)));
        assert_eq!(s.desired_job_list(), &[id("ns::ok")]);
        assert_eq!(s.run_list(), &[id("ns::ok")]);
    }

    #[test]
    fn test_mandatory_jobs_come_first() {
        let mut s = state(vec![
            JobDefinition::new("ns::a", Some("true")),
            JobDefinition::new("ns::m", Some("true")),
        ]);
        s.update_mandatory_job_list(vec![id("ns::m")]);
        s.update_desired_job_list(vec![id("ns::a"), id("ns::m")]);
        assert_eq!(s.desired_job_list(), &[id("ns::m"), id("ns::a")]);
    }

    #[test]
    fn test_bad_program_is_a_definition_problem() {
        let mut s = state(vec![
            JobDefinition::new("ns::a", Some("true")).with_requires("import os"),
        ]);
        assert_eq!(s.definition_problems().len(), 1);
        assert_eq!(s.definition_problems()[0].job_id, id("ns::a"));
        let problems = s.update_desired_job_list(vec![id("ns::a")]);
        assert_eq!(problems, vec![DependencyError::Unknown(id("ns::a"))]);
        assert!(s.run_list().is_empty());
    }

    #[test]
    fn test_stats_and_progress() {
        let mut s = state(vec![
            JobDefinition::new("ns::a", Some("true")),
            JobDefinition::new("ns::b", Some("true")),
            JobDefinition::new("ns::c", Some("true")),
        ]);
        s.update_desired_job_list(vec![id("ns::a"), id("ns::b"), id("ns::c")]);
        s.update_job_result(&id("ns::a"), pass()).unwrap();
        s.update_job_result(&id("ns::b"), JobResult::with_outcome(Outcome::Fail))
            .unwrap();
        assert_eq!(s.progress(), Progress { done: 2, total: 3 });
        let stats = s.get_outcome_stats();
        assert_eq!(stats.get(&Outcome::Pass), Some(&1));
        assert_eq!(stats.get(&Outcome::Fail), Some(&1));
        assert_eq!(s.job_state(&id("ns::a")).unwrap().attempts(), 2);
    }
}
