//! Terminal prompts for the decisions a person has to make.

use std::io::{self, BufRead, Write};

use benchplan_core::{Interaction, JobDefinition, JobId, JobResult, Outcome, SessionId, TestPlanId};
use benchplan_execution::Verifier;
use benchplan_remote::{InterruptChoice, Operator, TestPlanSummary};

/// Reads answers from stdin.
#[derive(Debug, Default)]
pub struct Prompt;

impl Prompt {
    fn ask(&self, question: &str) -> Option<String> {
        print!("{} ", question);
        io::stdout().flush().ok()?;
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }

    fn show(&self, job_id: &JobId, interactions: &[Interaction], result: &JobResult) {
        println!("\n== {}", job_id);
        for interaction in interactions {
            println!("[{:?}] {}", interaction.kind, interaction.message);
        }
        if !result.stdout.is_empty() {
            println!("--- output\n{}", result.stdout.trim_end());
        }
    }

    fn outcome(&self) -> Outcome {
        loop {
            match self.ask("Outcome? [p]ass / [f]ail / [s]kip:").as_deref() {
                Some("p") | Some("pass") => return Outcome::Pass,
                Some("f") | Some("fail") => return Outcome::Fail,
                Some("s") | Some("skip") | None => return Outcome::Skip,
                Some(_) => continue,
            }
        }
    }

    fn pick<T: Clone>(&self, label: &str, items: &[(T, String)]) -> Option<T> {
        if items.is_empty() {
            return None;
        }
        for (i, (_, name)) in items.iter().enumerate() {
            println!("  {}) {}", i + 1, name);
        }
        let answer = self.ask(&format!("{} [1-{}, empty to cancel]:", label, items.len()))?;
        let index: usize = answer.parse().ok()?;
        items.get(index.checked_sub(1)?).map(|(item, _)| item.clone())
    }
}

impl Verifier for Prompt {
    fn verify(&self, job: &JobDefinition, interactions: &[Interaction], result: &JobResult) -> Outcome {
        self.show(&job.id, interactions, result);
        self.outcome()
    }
}

impl Operator for Prompt {
    fn choose_resume(&self, sessions: &[SessionId]) -> Option<SessionId> {
        let items: Vec<_> = sessions.iter().map(|id| (id.clone(), id.to_string())).collect();
        if items.is_empty() {
            return None;
        }
        println!("Unfinished sessions:");
        self.pick("Resume", &items)
    }

    fn choose_test_plan(&self, plans: &[TestPlanSummary]) -> Option<TestPlanId> {
        let items: Vec<_> = plans
            .iter()
            .map(|plan| (plan.id.clone(), format!("{} ({})", plan.name, plan.id)))
            .collect();
        println!("Test plans:");
        self.pick("Test plan", &items)
    }

    fn interact(&self, job_id: &JobId, interactions: &[Interaction], result: &JobResult) -> JobResult {
        self.show(job_id, interactions, result);
        let comments = self.ask("Comment (optional):").unwrap_or_default();
        let mut verdict = result.clone();
        verdict.outcome = Some(self.outcome());
        if !comments.is_empty() {
            verdict.comments = Some(comments);
        }
        verdict
    }

    fn choose_rerun(&self, candidates: &[JobId]) -> Vec<JobId> {
        println!("Jobs that could run again:");
        for id in candidates {
            println!("  {}", id);
        }
        match self.ask("Rerun them all? [y/N]:").as_deref() {
            Some("y") | Some("yes") => candidates.to_vec(),
            _ => Vec::new(),
        }
    }

    fn on_interrupt(&self) -> InterruptChoice {
        match self
            .ask("Interrupted: [c]ontinue / [d]etach / [s]top session / [a]bandon and finalize?")
            .as_deref()
        {
            Some("c") => InterruptChoice::Resume,
            Some("d") => InterruptChoice::Detach,
            Some("a") => InterruptChoice::Abandon,
            _ => InterruptChoice::Stop,
        }
    }
}
