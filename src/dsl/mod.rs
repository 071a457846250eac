pub mod builder;

use crate::flow::{BranchMeta, Settings, StepType, TriggerKind};
use serde::{Deserialize, Serialize};
use std::iter;

/// Legacy trigger: the head of the pointer-chained step tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LegacyTrigger {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub valid: bool,
    #[serde(rename = "type")]
    pub kind: TriggerKind,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<Box<LegacyStep>>,
}

/// Legacy step. Structure is embedded: `next_action` continues the chain,
/// routers and loops own the heads of their sub-chains.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LegacyStep {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub skip: bool,
    #[serde(flatten)]
    pub kind: LegacyStepKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<Box<LegacyStep>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LegacyStepKind {
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
        settings: RouterSettings,
        /// Branch heads, aligned positionally with `settings.branches`.
        #[serde(default)]
        children: Vec<Option<LegacyStep>>,
    },
    LoopOnItems {
        #[serde(default)]
        settings: Settings,
        #[serde(
            default,
            rename = "firstLoopAction",
            skip_serializing_if = "Option::is_none"
        )]
        first_loop_action: Option<Box<LegacyStep>>,
    },
}

/// Router settings still carry the branch metadata in the legacy form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RouterSettings {
    #[serde(default)]
    pub branches: Vec<BranchMeta>,
    #[serde(flatten)]
    pub rest: Settings,
}

/// Iterates a pointer chain starting at `head`.
pub fn chain(head: Option<&LegacyStep>) -> impl Iterator<Item = &LegacyStep> {
    iter::successors(head, |step| step.next_action())
}

impl LegacyTrigger {
    pub fn first_step(&self) -> Option<&LegacyStep> {
        self.next_action.as_deref()
    }

    /// All reachable steps in discovery order: a step, then its nested
    /// content, then the next step of its chain.
    pub fn walk(&self) -> Vec<&LegacyStep> {
        let mut order = Vec::new();
        let mut pending: Vec<&LegacyStep> = self.first_step().into_iter().collect();

        while let Some(step) = pending.pop() {
            order.push(step);
            if let Some(next) = step.next_action() {
                pending.push(next);
            }
            let nested: Vec<&LegacyStep> = step.nested_heads().collect();
            pending.extend(nested.into_iter().rev());
        }

        order
    }

    pub fn step_count(&self) -> usize {
        self.walk().len()
    }
}

impl LegacyStep {
    pub fn step_type(&self) -> StepType {
        match &self.kind {
            LegacyStepKind::Code { .. } => StepType::Code,
            LegacyStepKind::Piece { .. } => StepType::Piece,
            LegacyStepKind::Router { .. } => StepType::Router,
            LegacyStepKind::LoopOnItems { .. } => StepType::LoopOnItems,
        }
    }

    pub fn next_action(&self) -> Option<&LegacyStep> {
        self.next_action.as_deref()
    }

    pub fn first_loop_action(&self) -> Option<&LegacyStep> {
        match &self.kind {
            LegacyStepKind::LoopOnItems {
                first_loop_action, ..
            } => first_loop_action.as_deref(),
            _ => None,
        }
    }

    pub fn branch_meta(&self) -> &[BranchMeta] {
        match &self.kind {
            LegacyStepKind::Router { settings, .. } => &settings.branches,
            _ => &[],
        }
    }

    /// Head of the chain for each declared branch. A missing or null child
    /// is reported as `None`; children past the declared branches are not.
    pub fn branch_heads(&self) -> Vec<Option<&LegacyStep>> {
        match &self.kind {
            LegacyStepKind::Router { settings, children } => (0..settings.branches.len())
                .map(|i| children.get(i).and_then(Option::as_ref))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Every embedded sub-chain head: router children (all of them) or the loop body.
    pub fn nested_heads(&self) -> impl Iterator<Item = &LegacyStep> {
        let children: &[Option<LegacyStep>] = match &self.kind {
            LegacyStepKind::Router { children, .. } => children,
            _ => &[],
        };
        children
            .iter()
            .filter_map(Option::as_ref)
            .chain(self.first_loop_action())
    }
}
