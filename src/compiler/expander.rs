use crate::compiler::validator::Validator;
use crate::dsl::builder::link;
use crate::dsl::{LegacyStep, LegacyStepKind, LegacyTrigger, RouterSettings};
use crate::error::StructuralIntegrityError;
use crate::flow::{FlowTrigger, Step, StepIndex, StepKind};

/// Rebuilds the legacy pointer-chained view of a flat flow.
///
/// Empty router branches come back as `null` children so `children` stays
/// aligned with `settings.branches`. Empty loop bodies and an empty trigger
/// chain leave `firstLoopAction` / `nextAction` unset.
pub struct Expander;

impl Expander {
    pub fn new() -> Self {
        Self
    }

    pub fn expand(
        &self,
        trigger: &FlowTrigger,
        steps: &[Step],
    ) -> Result<LegacyTrigger, StructuralIntegrityError> {
        Validator::validate(trigger, steps)?;
        let index = StepIndex::new(steps);

        Ok(LegacyTrigger {
            name: trigger.name.clone(),
            display_name: trigger.display_name.clone(),
            valid: trigger.valid,
            kind: trigger.kind,
            settings: trigger.settings.clone(),
            next_action: expand_chain(&index, &trigger.name, &trigger.steps)?,
        })
    }
}

impl Default for Expander {
    fn default() -> Self {
        Self::new()
    }
}

fn expand_chain(
    index: &StepIndex<'_>,
    owner: &str,
    names: &[String],
) -> Result<Option<Box<LegacyStep>>, StructuralIntegrityError> {
    let resolved = index
        .resolve(names)
        .map_err(|name| StructuralIntegrityError::UnresolvedReference {
            name,
            referenced_by: owner.to_string(),
        })?;

    let chain = resolved
        .into_iter()
        .map(|step| expand_step(index, step))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(link(chain))
}

fn expand_step(index: &StepIndex<'_>, step: &Step) -> Result<LegacyStep, StructuralIntegrityError> {
    let kind = match &step.kind {
        StepKind::Code { settings } => LegacyStepKind::Code {
            settings: settings.clone(),
        },
        StepKind::Piece { settings } => LegacyStepKind::Piece {
            settings: settings.clone(),
        },
        StepKind::Router { settings, branches } => {
            let mut children = Vec::with_capacity(branches.len());
            for branch in branches {
                let head = expand_chain(index, &step.name, &branch.steps)?;
                children.push(head.map(|h| *h));
            }
            LegacyStepKind::Router {
                settings: RouterSettings {
                    branches: branches.iter().map(|b| b.meta.clone()).collect(),
                    rest: settings.clone(),
                },
                children,
            }
        }
        StepKind::LoopOnItems { settings, children } => LegacyStepKind::LoopOnItems {
            settings: settings.clone(),
            first_loop_action: expand_chain(index, &step.name, children)?,
        },
    };

    Ok(LegacyStep {
        name: step.name.clone(),
        display_name: step.display_name.clone(),
        valid: step.valid,
        skip: step.skip,
        kind,
        next_action: None,
    })
}
