use crate::dsl::LegacyTrigger;
use crate::flow::{FlowTrigger, Step};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Monotonic representation tag of a stored flow version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaVersion(pub u32);

impl SchemaVersion {
    /// First version whose steps are stored flat.
    pub const FLAT_STEPS: SchemaVersion = SchemaVersion(8);
    /// Newest version this crate understands.
    pub const CURRENT: SchemaVersion = SchemaVersion::FLAT_STEPS;

    pub fn is_nested(&self) -> bool {
        *self < Self::FLAT_STEPS
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored flow version whose steps are still pointer-chained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyFlowVersion {
    pub id: String,
    pub display_name: String,
    pub schema_version: SchemaVersion,
    pub trigger: LegacyTrigger,
}

/// A stored flow version in canonical form: every step lives once in `steps`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowVersion {
    pub id: String,
    pub display_name: String,
    pub schema_version: SchemaVersion,
    pub trigger: FlowTrigger,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl FlowVersion {
    pub fn index(&self) -> StepIndex<'_> {
        StepIndex::new(&self.steps)
    }
}

/// Name lookup over a flat step arena.
///
/// On duplicate names the first occurrence wins; run the validator first if
/// the arena is untrusted.
#[derive(Debug, Clone)]
pub struct StepIndex<'a> {
    steps: &'a [Step],
    positions: HashMap<&'a str, usize>,
}

impl<'a> StepIndex<'a> {
    pub fn new(steps: &'a [Step]) -> Self {
        let mut positions = HashMap::with_capacity(steps.len());
        for (idx, step) in steps.iter().enumerate() {
            positions.entry(step.name.as_str()).or_insert(idx);
        }
        Self { steps, positions }
    }

    pub fn get(&self, name: &str) -> Option<&'a Step> {
        self.positions.get(name).map(|&idx| &self.steps[idx])
    }

    /// Position of the step in discovery order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    /// Resolves a chain, branch or loop body. Returns the first unknown name on failure.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&'a Step>, String> {
        names
            .iter()
            .map(|n| self.get(n.as_ref()).ok_or_else(|| n.as_ref().to_string()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
