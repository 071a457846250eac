pub mod version;

pub use version::{FlowVersion, LegacyFlowVersion, SchemaVersion, StepIndex};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Opaque, kind-specific step payload. Never interpreted by the normalizer.
pub type Settings = Map<String, Value>;

/// Settings key that holds router branch metadata in the nested form.
pub const BRANCHES_KEY: &str = "branches";

/// Kind tag shared by both representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepType {
    Code,
    Piece,
    Router,
    LoopOnItems,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Code => "CODE",
            StepType::Piece => "PIECE",
            StepType::Router => "ROUTER",
            StepType::LoopOnItems => "LOOP_ON_ITEMS",
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerKind {
    Empty,
    PieceTrigger,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BranchKind {
    #[default]
    Condition,
    Fallback,
}

/// Router branch metadata, identical in both forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchMeta {
    pub branch_label: String,
    #[serde(default)]
    pub branch_kind: BranchKind,
    /// `Some(Value::Null)` keeps an explicit `null` apart from a missing key.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub conditions: Option<Value>,
}

impl BranchMeta {
    pub fn condition(label: &str) -> Self {
        Self {
            branch_label: label.to_string(),
            branch_kind: BranchKind::Condition,
            conditions: None,
        }
    }

    pub fn fallback(label: &str) -> Self {
        Self {
            branch_label: label.to_string(),
            branch_kind: BranchKind::Fallback,
            conditions: None,
        }
    }
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// A router branch in flat form: its metadata plus the ordered names of its chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterBranch {
    #[serde(flatten)]
    pub meta: BranchMeta,
    #[serde(default)]
    pub steps: Vec<String>,
}

/// Flat-form trigger. `steps` lists every step of the top-level chain in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowTrigger {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub valid: bool,
    #[serde(rename = "type")]
    pub kind: TriggerKind,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub steps: Vec<String>,
}

/// Flat-form step. Structure is expressed only through name lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub skip: bool,
    #[serde(flatten)]
    pub kind: StepKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepKind {
    Code {
        #[serde(default)]
        settings: Settings,
    },
    Piece {
        #[serde(default)]
        settings: Settings,
    },
    Router {
        #[serde(default)]
        settings: Settings,
        #[serde(default)]
        branches: Vec<RouterBranch>,
    },
    LoopOnItems {
        #[serde(default)]
        settings: Settings,
        #[serde(default)]
        children: Vec<String>,
    },
}

impl Step {
    pub fn step_type(&self) -> StepType {
        match &self.kind {
            StepKind::Code { .. } => StepType::Code,
            StepKind::Piece { .. } => StepType::Piece,
            StepKind::Router { .. } => StepType::Router,
            StepKind::LoopOnItems { .. } => StepType::LoopOnItems,
        }
    }

    pub fn settings(&self) -> &Settings {
        match &self.kind {
            StepKind::Code { settings }
            | StepKind::Piece { settings }
            | StepKind::Router { settings, .. }
            | StepKind::LoopOnItems { settings, .. } => settings,
        }
    }

    pub fn branches(&self) -> &[RouterBranch] {
        match &self.kind {
            StepKind::Router { branches, .. } => branches,
            _ => &[],
        }
    }

    pub fn children(&self) -> &[String] {
        match &self.kind {
            StepKind::LoopOnItems { children, .. } => children,
            _ => &[],
        }
    }

    /// Every name this step references, branches first in branch order.
    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.branches()
            .iter()
            .flat_map(|b| b.steps.iter())
            .chain(self.children().iter())
            .map(String::as_str)
    }
}
