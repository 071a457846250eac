use crate::flow::SchemaVersion;
use std::fmt;
use thiserror::Error;

/// The flat-form invariant a `StructuralIntegrityError` reports against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invariant {
    /// Every referenced name resolves to a step.
    NameResolution,
    /// No two steps share a name.
    UniqueNames,
    /// Every step is reachable from the trigger exactly once.
    Reachability,
    /// Router settings carry no `branches` key.
    RouterSettings,
    /// Chains keep their source order.
    Ordering,
}

impl fmt::Display for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Invariant::NameResolution => "name resolution",
            Invariant::UniqueNames => "unique names",
            Invariant::Reachability => "reachability",
            Invariant::RouterSettings => "router settings",
            Invariant::Ordering => "ordering",
        };
        f.write_str(name)
    }
}

/// A flat step graph that breaks one of its structural invariants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuralIntegrityError {
    #[error("[unique names] step name '{name}' is used by more than one step")]
    DuplicateStepName { name: String },

    #[error("[name resolution] '{referenced_by}' references unknown step '{name}'")]
    UnresolvedReference { name: String, referenced_by: String },

    #[error("[reachability] step '{name}' is referenced by both '{first_parent}' and '{second_parent}'")]
    MultiplyReferenced {
        name: String,
        first_parent: String,
        second_parent: String,
    },

    #[error("[reachability] step '{name}' is not reachable from the trigger")]
    OrphanStep { name: String },

    #[error("[reachability] expected {expected} steps from the source flow, found {found}")]
    StepCountMismatch { expected: usize, found: usize },

    #[error("[router settings] router '{name}' still carries a 'branches' key in its settings")]
    BranchesInRouterSettings { name: String },

    #[error("[ordering] chain owned by '{owner}' should be {expected:?}, found {found:?}")]
    ChainOrderMismatch {
        owner: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("[ordering] router '{router}' should have {expected} branches, found {found}")]
    BranchCountMismatch {
        router: String,
        expected: usize,
        found: usize,
    },

    #[error("[ordering] branch {position} of router '{router}' does not match its source metadata")]
    BranchMetaMismatch { router: String, position: usize },

    #[error("[ordering] step at position {position} should be '{expected}', found '{found}'")]
    DiscoveryOrderMismatch {
        position: usize,
        expected: String,
        found: String,
    },

    #[error("[reachability] step '{name}' has kind {found}, source has {expected}")]
    KindMismatch {
        name: String,
        expected: String,
        found: String,
    },
}

impl StructuralIntegrityError {
    pub fn invariant(&self) -> Invariant {
        match self {
            Self::DuplicateStepName { .. } => Invariant::UniqueNames,
            Self::UnresolvedReference { .. } => Invariant::NameResolution,
            Self::MultiplyReferenced { .. }
            | Self::OrphanStep { .. }
            | Self::StepCountMismatch { .. }
            | Self::KindMismatch { .. } => Invariant::Reachability,
            Self::BranchesInRouterSettings { .. } => Invariant::RouterSettings,
            Self::ChainOrderMismatch { .. }
            | Self::BranchCountMismatch { .. }
            | Self::BranchMetaMismatch { .. }
            | Self::DiscoveryOrderMismatch { .. } => Invariant::Ordering,
        }
    }

    /// Names of the offending steps.
    pub fn step_names(&self) -> Vec<&str> {
        match self {
            Self::DuplicateStepName { name }
            | Self::OrphanStep { name }
            | Self::BranchesInRouterSettings { name }
            | Self::KindMismatch { name, .. } => vec![name.as_str()],
            Self::UnresolvedReference {
                name,
                referenced_by,
            } => vec![name.as_str(), referenced_by.as_str()],
            Self::MultiplyReferenced {
                name,
                first_parent,
                second_parent,
            } => vec![name.as_str(), first_parent.as_str(), second_parent.as_str()],
            Self::StepCountMismatch { .. } => Vec::new(),
            Self::ChainOrderMismatch { owner: name, .. }
            | Self::BranchCountMismatch { router: name, .. }
            | Self::BranchMetaMismatch { router: name, .. } => vec![name.as_str()],
            Self::DiscoveryOrderMismatch {
                expected, found, ..
            } => vec![expected.as_str(), found.as_str()],
        }
    }
}

/// Failures of the schema-version gate.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("record has no readable 'schemaVersion'")]
    MissingSchemaVersion,

    #[error("schema version {found} is newer than the supported version {supported}")]
    UnsupportedSchemaVersion {
        found: SchemaVersion,
        supported: SchemaVersion,
    },

    #[error("record is at schema version {found}, which still uses nested steps")]
    NotFlat { found: SchemaVersion },

    #[error("record nests deeper than {limit} levels")]
    TooDeep { limit: usize },

    #[error("failed to decode flow version: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("flow version '{id}' failed structural validation: {source}")]
    Integrity {
        id: String,
        #[source]
        source: StructuralIntegrityError,
    },
}
