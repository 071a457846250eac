use crate::dsl::{LegacyStep, LegacyTrigger, chain};
use crate::error::StructuralIntegrityError;
use crate::flow::{BRANCHES_KEY, FlowTrigger, Step, StepIndex, StepType};
use std::collections::{HashMap, HashSet};

pub struct Validator;

impl Validator {
    /// Checks the flat invariants that need no source: unique names, resolvable
    /// references, single ownership, reachability and router settings.
    pub fn validate(trigger: &FlowTrigger, steps: &[Step]) -> Result<(), StructuralIntegrityError> {
        check_unique_names(steps)?;
        let index = StepIndex::new(steps);

        // parent of every referenced name, to catch steps owned by two lists
        let mut owners: HashMap<&str, &str> = HashMap::with_capacity(steps.len());
        let references = trigger
            .steps
            .iter()
            .map(|name| (trigger.name.as_str(), name.as_str()))
            .chain(steps.iter().flat_map(|step| {
                step.child_names()
                    .map(move |child| (step.name.as_str(), child))
            }));

        for (parent, name) in references {
            if !index.contains(name) {
                return Err(StructuralIntegrityError::UnresolvedReference {
                    name: name.to_string(),
                    referenced_by: parent.to_string(),
                });
            }
            if let Some(first_parent) = owners.insert(name, parent) {
                return Err(StructuralIntegrityError::MultiplyReferenced {
                    name: name.to_string(),
                    first_parent: first_parent.to_string(),
                    second_parent: parent.to_string(),
                });
            }
        }

        let reachable = reachable_from(trigger, &index);
        if let Some(orphan) = steps.iter().find(|s| !reachable.contains(s.name.as_str())) {
            return Err(StructuralIntegrityError::OrphanStep {
                name: orphan.name.clone(),
            });
        }

        for step in steps {
            if step.step_type() == StepType::Router && step.settings().contains_key(BRANCHES_KEY) {
                return Err(StructuralIntegrityError::BranchesInRouterSettings {
                    name: step.name.clone(),
                });
            }
        }

        Ok(())
    }

    /// Runs `validate`, then compares the flat output with the nested flow it
    /// came from: same step count, same kinds, same branch metadata, same order
    /// in every chain and in the arena.
    pub fn validate_against(
        source: &LegacyTrigger,
        trigger: &FlowTrigger,
        steps: &[Step],
    ) -> Result<(), StructuralIntegrityError> {
        Self::validate(trigger, steps)?;

        let discovered = source.walk();
        if discovered.len() != steps.len() {
            return Err(StructuralIntegrityError::StepCountMismatch {
                expected: discovered.len(),
                found: steps.len(),
            });
        }

        check_chain(&source.name, source.first_step(), &trigger.steps)?;

        let index = StepIndex::new(steps);
        for legacy in &discovered {
            let Some(flat) = index.get(&legacy.name) else {
                return Err(StructuralIntegrityError::UnresolvedReference {
                    name: legacy.name.clone(),
                    referenced_by: source.name.clone(),
                });
            };
            if flat.step_type() != legacy.step_type() {
                return Err(StructuralIntegrityError::KindMismatch {
                    name: legacy.name.clone(),
                    expected: legacy.step_type().to_string(),
                    found: flat.step_type().to_string(),
                });
            }
            match legacy.step_type() {
                StepType::Router => {
                    let metas = legacy.branch_meta();
                    let branches = flat.branches();
                    if metas.len() != branches.len() {
                        return Err(StructuralIntegrityError::BranchCountMismatch {
                            router: legacy.name.clone(),
                            expected: metas.len(),
                            found: branches.len(),
                        });
                    }
                    if let Some(position) = metas
                        .iter()
                        .zip(branches)
                        .position(|(meta, branch)| *meta != branch.meta)
                    {
                        return Err(StructuralIntegrityError::BranchMetaMismatch {
                            router: legacy.name.clone(),
                            position,
                        });
                    }
                    for (head, branch) in legacy.branch_heads().into_iter().zip(branches) {
                        check_chain(&legacy.name, head, &branch.steps)?;
                    }
                }
                StepType::LoopOnItems => {
                    check_chain(&legacy.name, legacy.first_loop_action(), flat.children())?;
                }
                StepType::Code | StepType::Piece => {}
            }
        }

        for (position, (legacy, flat)) in discovered.iter().zip(steps).enumerate() {
            if legacy.name != flat.name {
                return Err(StructuralIntegrityError::DiscoveryOrderMismatch {
                    position,
                    expected: legacy.name.clone(),
                    found: flat.name.clone(),
                });
            }
        }

        Ok(())
    }
}

fn check_unique_names(steps: &[Step]) -> Result<(), StructuralIntegrityError> {
    let mut seen = HashSet::with_capacity(steps.len());
    for step in steps {
        if !seen.insert(step.name.as_str()) {
            return Err(StructuralIntegrityError::DuplicateStepName {
                name: step.name.clone(),
            });
        }
    }
    Ok(())
}

fn reachable_from<'a>(trigger: &'a FlowTrigger, index: &StepIndex<'a>) -> HashSet<&'a str> {
    let mut reached = HashSet::new();
    let mut pending: Vec<&'a str> = trigger.steps.iter().map(String::as_str).collect();

    while let Some(name) = pending.pop() {
        if !reached.insert(name) {
            continue;
        }
        if let Some(step) = index.get(name) {
            pending.extend(step.child_names());
        }
    }

    reached
}

fn check_chain(
    owner: &str,
    head: Option<&LegacyStep>,
    found: &[String],
) -> Result<(), StructuralIntegrityError> {
    let expected: Vec<&str> = chain(head).map(|s| s.name.as_str()).collect();
    if expected.iter().copied().ne(found.iter().map(String::as_str)) {
        return Err(StructuralIntegrityError::ChainOrderMismatch {
            owner: owner.to_string(),
            expected: expected.into_iter().map(str::to_string).collect(),
            found: found.to_vec(),
        });
    }
    Ok(())
}
