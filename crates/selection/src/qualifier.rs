//! Qualifiers: rules that vote on whether a job is selected.

use std::fmt;

use benchplan_core::JobDefinition;
use regex::Regex;

use crate::error::{Result, SelectionError};

/// A qualifier's opinion about one job.
///
/// Variants are declared in priority order so `Ord` gives
/// `Ignore < Include < Exclude`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Vote {
    /// No opinion
    Ignore,
    /// Select the job
    Include,
    /// Never select the job
    Exclude,
}

impl Vote {
    /// Highest-priority vote, `Ignore` for an empty iterator.
    pub fn reduce(votes: impl IntoIterator<Item = Vote>) -> Vote {
        votes.into_iter().max().unwrap_or(Vote::Ignore)
    }
}

/// Where a qualifier was defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    /// Source name (file, test plan field, command line, ...)
    pub source: String,
    /// 1-based line, if known
    pub line: Option<usize>,
}

impl Origin {
    /// Origin without a line number.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            line: None,
        }
    }

    /// Same source, specific line.
    pub fn at_line(&self, line: usize) -> Self {
        Self {
            source: self.source.clone(),
            line: Some(line),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.source, line),
            None => f.write_str(&self.source),
        }
    }
}

/// Job attribute a qualifier looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobField {
    /// Fully qualified id
    #[default]
    Id,
    /// Category id (empty when unset)
    Category,
    /// Certification status
    CertificationStatus,
    /// Plugin name
    Plugin,
}

impl JobField {
    fn value(self, job: &JobDefinition) -> String {
        match self {
            JobField::Id => job.id.to_string(),
            JobField::Category => job.category_id.clone().unwrap_or_default(),
            JobField::CertificationStatus => job.certification_status.clone(),
            JobField::Plugin => job.plugin.to_string(),
        }
    }
}

/// How a field value is matched.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// String equality
    Exact(String),
    /// Full-string regular expression match
    Pattern(Regex),
}

impl Matcher {
    /// Compile `pattern` with an implicit `^...$`.
    pub fn anchored(pattern: &str, origin: Option<&Origin>) -> Result<Self> {
        let anchored = format!("^(?:{})$", pattern);
        Regex::new(&anchored)
            .map(Matcher::Pattern)
            .map_err(|source| SelectionError::InvalidPattern {
                pattern: pattern.to_string(),
                origin: origin.cloned(),
                source,
            })
    }

    /// Translate a shell glob (`*`, `?`) into an anchored regex.
    pub fn glob(glob: &str, origin: Option<&Origin>) -> Result<Self> {
        let mut pattern = String::with_capacity(glob.len() * 2);
        for c in glob.chars() {
            match c {
                '*' => pattern.push_str(".*"),
                '?' => pattern.push('.'),
                c => pattern.push_str(&regex::escape(&c.to_string())),
            }
        }
        Self::anchored(&pattern, origin)
    }

    /// Exact match for literal text, anchored regex otherwise.
    pub fn literal_or_pattern(text: &str, origin: Option<&Origin>) -> Result<Self> {
        if regex::escape(text) == text {
            Ok(Matcher::Exact(text.to_string()))
        } else {
            Self::anchored(text, origin)
        }
    }

    /// Whether `value` matches.
    pub fn is_match(&self, value: &str) -> bool {
        match self {
            Matcher::Exact(expected) => expected == value,
            Matcher::Pattern(re) => re.is_match(value),
        }
    }
}

/// A single include or exclude rule.
#[derive(Debug, Clone)]
pub struct SimpleQualifier {
    field: JobField,
    matcher: Matcher,
    inclusive: bool,
    origin: Option<Origin>,
}

impl SimpleQualifier {
    /// Qualifier on the job id.
    pub fn new(matcher: Matcher, inclusive: bool) -> Self {
        Self {
            field: JobField::Id,
            matcher,
            inclusive,
            origin: None,
        }
    }

    /// Exact job id.
    pub fn id(id: impl Into<String>, inclusive: bool) -> Self {
        Self::new(Matcher::Exact(id.into()), inclusive)
    }

    /// Anchored regex over the job id.
    pub fn regex(pattern: &str, inclusive: bool) -> Result<Self> {
        Ok(Self::new(Matcher::anchored(pattern, None)?, inclusive))
    }

    /// Shell glob over the job id.
    pub fn glob(glob: &str, inclusive: bool) -> Result<Self> {
        Ok(Self::new(Matcher::glob(glob, None)?, inclusive))
    }

    /// Look at another field.
    pub fn on_field(mut self, field: JobField) -> Self {
        self.field = field;
        self
    }

    /// Record the definition point.
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Whether a match includes (true) or excludes (false).
    pub fn inclusive(&self) -> bool {
        self.inclusive
    }

    /// Definition point, if known.
    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    /// Raw yes/no match, ignoring inclusiveness.
    pub fn is_match(&self, job: &JobDefinition) -> bool {
        self.matcher.is_match(&self.field.value(job))
    }

    /// Vote for `job`.
    pub fn vote(&self, job: &JobDefinition) -> Vote {
        match (self.is_match(job), self.inclusive) {
            (false, _) => Vote::Ignore,
            (true, true) => Vote::Include,
            (true, false) => Vote::Exclude,
        }
    }
}

/// Any qualifier.
#[derive(Debug, Clone)]
pub enum Qualifier {
    /// One rule
    Simple(SimpleQualifier),
    /// Ordered children; the strongest vote wins
    Composite(Vec<Qualifier>),
    /// Rules loaded from a named pattern list
    NamedList {
        /// List name
        name: String,
        /// One leaf per pattern line
        qualifiers: Vec<Qualifier>,
    },
}

impl Qualifier {
    /// Vote for `job`.
    pub fn vote(&self, job: &JobDefinition) -> Vote {
        match self {
            Qualifier::Simple(q) => q.vote(job),
            Qualifier::Composite(children) | Qualifier::NamedList { qualifiers: children, .. } => {
                Vote::reduce(children.iter().map(|q| q.vote(job)))
            }
        }
    }

    /// Whether `job` gets an `Include` vote.
    pub fn designates(&self, job: &JobDefinition) -> bool {
        self.vote(job) == Vote::Include
    }

    /// Leaf qualifiers, depth first.
    pub fn primitives(&self) -> Vec<&SimpleQualifier> {
        let mut out = Vec::new();
        self.collect_primitives(&mut out);
        out
    }

    fn collect_primitives<'a>(&'a self, out: &mut Vec<&'a SimpleQualifier>) {
        match self {
            Qualifier::Simple(q) => out.push(q),
            Qualifier::Composite(children) | Qualifier::NamedList { qualifiers: children, .. } => {
                for child in children {
                    child.collect_primitives(out);
                }
            }
        }
    }
}

impl From<SimpleQualifier> for Qualifier {
    fn from(q: SimpleQualifier) -> Self {
        Qualifier::Simple(q)
    }
}

/// Flatten a list of qualifiers into their leaves.
pub fn flatten(qualifiers: &[Qualifier]) -> Vec<&SimpleQualifier> {
    qualifiers.iter().flat_map(Qualifier::primitives).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str) -> JobDefinition {
        JobDefinition::new(id, None)
    }

    #[test]
    fn test_vote_order() {
        assert!(Vote::Exclude > Vote::Include);
        assert!(Vote::Include > Vote::Ignore);
        assert_eq!(Vote::reduce([]), Vote::Ignore);
        assert_eq!(Vote::reduce([Vote::Include, Vote::Exclude, Vote::Ignore]), Vote::Exclude);
    }

    #[test]
    fn test_simple_votes() {
        let include = SimpleQualifier::id("ns::a", true);
        let exclude = SimpleQualifier::id("ns::a", false);
        assert_eq!(include.vote(&job("ns::a")), Vote::Include);
        assert_eq!(exclude.vote(&job("ns::a")), Vote::Exclude);
        assert_eq!(include.vote(&job("ns::b")), Vote::Ignore);
        assert_eq!(exclude.vote(&job("ns::b")), Vote::Ignore);
    }

    #[test]
    fn test_regex_is_anchored() {
        let q = SimpleQualifier::regex("ns::a", true).unwrap();
        assert!(q.is_match(&job("ns::a")));
        assert!(!q.is_match(&job("ns::ab")));
        assert!(!q.is_match(&job("xns::a")));
        let alt = SimpleQualifier::regex("a|b", true).unwrap();
        assert!(!alt.is_match(&job("ab")));
    }

    #[test]
    fn test_glob() {
        let q = SimpleQualifier::glob("ns::disk/*", true).unwrap();
        assert!(q.is_match(&job("ns::disk/read")));
        assert!(!q.is_match(&job("ns::diskread")));
        let one = SimpleQualifier::glob("a?c", true).unwrap();
        assert!(one.is_match(&job("abc")));
        assert!(!one.is_match(&job("a.bc")));
    }

    #[test]
    fn test_invalid_regex_reports_origin() {
        let origin = Origin::new("plan.txt").at_line(3);
        let err = Matcher::anchored("(", Some(&origin)).unwrap_err();
        assert!(err.to_string().starts_with("plan.txt:3: invalid pattern"));
    }

    #[test]
    fn test_composite_and_flatten() {
        let q = Qualifier::Composite(vec![
            SimpleQualifier::glob("*", true).unwrap().into(),
            Qualifier::Composite(vec![SimpleQualifier::id("b", false).into()]),
        ]);
        assert_eq!(q.vote(&job("a")), Vote::Include);
        assert_eq!(q.vote(&job("b")), Vote::Exclude);
        assert_eq!(q.primitives().len(), 2);
        assert_eq!(Qualifier::Composite(vec![]).vote(&job("a")), Vote::Ignore);
    }

    #[test]
    fn test_field_qualifier() {
        let q = SimpleQualifier::id("blocker", true).on_field(JobField::CertificationStatus);
        let mut j = job("a");
        assert_eq!(q.vote(&j), Vote::Ignore);
        j.certification_status = "blocker".into();
        assert_eq!(q.vote(&j), Vote::Include);
    }
}
