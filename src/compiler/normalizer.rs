use crate::dsl::{LegacyStep, LegacyStepKind, LegacyTrigger, chain};
use crate::flow::{FlowTrigger, RouterBranch, Step, StepKind};
use std::mem;
use tracing::{debug, warn};

/// Flattens a pointer-chained step tree into a trigger plus a step arena.
///
/// Steps land in the arena in discovery order: a step's slot is reserved
/// before its branches or loop body are collected, and the next step of the
/// chain follows its nested content.
pub struct Normalizer {
    steps: Vec<Step>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn normalize(&mut self, trigger: &LegacyTrigger) -> (FlowTrigger, Vec<Step>) {
        self.steps.clear();
        let names = self.collect_chain(trigger.first_step());

        let flat_trigger = FlowTrigger {
            name: trigger.name.clone(),
            display_name: trigger.display_name.clone(),
            valid: trigger.valid,
            kind: trigger.kind,
            settings: trigger.settings.clone(),
            steps: names,
        };

        debug!(
            trigger = %trigger.name,
            steps = self.steps.len(),
            "Normalized step tree"
        );
        (flat_trigger, mem::take(&mut self.steps))
    }

    /// Flattens every step of the chain starting at `head` and returns their names in order.
    fn collect_chain(&mut self, head: Option<&LegacyStep>) -> Vec<String> {
        let mut names = Vec::new();
        for step in chain(head) {
            names.push(step.name.clone());
            self.flatten_step(step);
        }
        names
    }

    fn flatten_step(&mut self, step: &LegacyStep) {
        let slot = self.steps.len();
        self.steps.push(Step {
            name: step.name.clone(),
            display_name: step.display_name.clone(),
            valid: step.valid,
            skip: step.skip,
            kind: shallow_kind(&step.kind),
        });

        match &step.kind {
            LegacyStepKind::Router { settings, children } => {
                if children.len() > settings.branches.len() {
                    warn!(
                        router = %step.name,
                        branches = settings.branches.len(),
                        children = children.len(),
                        "Router has children without branch metadata; they will not be placed"
                    );
                } else if children.len() < settings.branches.len() {
                    debug!(
                        router = %step.name,
                        branches = settings.branches.len(),
                        children = children.len(),
                        "Router is missing branch children; treating them as empty"
                    );
                }

                let lists: Vec<Vec<String>> = step
                    .branch_heads()
                    .into_iter()
                    .map(|head| self.collect_chain(head))
                    .collect();

                if let StepKind::Router { branches, .. } = &mut self.steps[slot].kind {
                    for (branch, names) in branches.iter_mut().zip(lists) {
                        branch.steps = names;
                    }
                }
            }
            LegacyStepKind::LoopOnItems {
                first_loop_action, ..
            } => {
                let body = self.collect_chain(first_loop_action.as_deref());
                debug!(loop_step = %step.name, body = body.len(), "Flattened loop body");

                if let StepKind::LoopOnItems { children, .. } = &mut self.steps[slot].kind {
                    *children = body;
                }
            }
            LegacyStepKind::Code { .. } | LegacyStepKind::Piece { .. } => {}
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Copies the payload of a step without its embedded structure. Name lists start empty.
fn shallow_kind(kind: &LegacyStepKind) -> StepKind {
    match kind {
        LegacyStepKind::Code { settings } => StepKind::Code {
            settings: settings.clone(),
        },
        LegacyStepKind::Piece { settings } => StepKind::Piece {
            settings: settings.clone(),
        },
        LegacyStepKind::Router { settings, .. } => StepKind::Router {
            settings: settings.rest.clone(),
            branches: settings
                .branches
                .iter()
                .map(|meta| RouterBranch {
                    meta: meta.clone(),
                    steps: Vec::new(),
                })
                .collect(),
        },
        LegacyStepKind::LoopOnItems { settings, .. } => StepKind::LoopOnItems {
            settings: settings.clone(),
            children: Vec::new(),
        },
    }
}

/// Convenience wrapper around a one-off `Normalizer`.
pub fn normalize(trigger: &LegacyTrigger) -> (FlowTrigger, Vec<Step>) {
    Normalizer::new().normalize(trigger)
}
