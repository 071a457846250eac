use serde_json::json;
use stepflow::compiler::normalizer::normalize;
use stepflow::dsl::builder::{StepBuilder, TriggerBuilder};
use stepflow::flow::{
    BranchMeta, FlowTrigger, RouterBranch, Settings, Step, StepKind, TriggerKind,
};
use stepflow::{Invariant, StructuralIntegrityError, Validator};

fn trigger(steps: &[&str]) -> FlowTrigger {
    FlowTrigger {
        name: "trigger".to_string(),
        display_name: "Trigger".to_string(),
        valid: true,
        kind: TriggerKind::Empty,
        settings: Settings::new(),
        steps: steps.iter().map(|s| s.to_string()).collect(),
    }
}

fn step(name: &str, kind: StepKind) -> Step {
    Step {
        name: name.to_string(),
        display_name: name.to_string(),
        valid: true,
        skip: false,
        kind,
    }
}

fn code(name: &str) -> Step {
    step(
        name,
        StepKind::Code {
            settings: Settings::new(),
        },
    )
}

fn looped(name: &str, children: &[&str]) -> Step {
    step(
        name,
        StepKind::LoopOnItems {
            settings: Settings::new(),
            children: children.iter().map(|s| s.to_string()).collect(),
        },
    )
}

fn router(name: &str, branches: &[&[&str]]) -> Step {
    step(
        name,
        StepKind::Router {
            settings: Settings::new(),
            branches: branches
                .iter()
                .enumerate()
                .map(|(i, names)| RouterBranch {
                    meta: BranchMeta::condition(&format!("branch {}", i)),
                    steps: names.iter().map(|s| s.to_string()).collect(),
                })
                .collect(),
        },
    )
}

#[test]
fn test_valid_flat_flow() {
    let steps = vec![
        code("A"),
        router("R", &[&["B"], &[]]),
        code("B"),
        looped("L", &["C"]),
        code("C"),
    ];

    Validator::validate(&trigger(&["A", "R", "L"]), &steps).expect("flow should be valid");
}

#[test]
fn test_duplicate_names() {
    let steps = vec![code("A"), looped("L", &["A"]), code("A")];

    let err = Validator::validate(&trigger(&["L"]), &steps).unwrap_err();

    assert_eq!(
        err,
        StructuralIntegrityError::DuplicateStepName {
            name: "A".to_string()
        }
    );
    assert_eq!(err.invariant(), Invariant::UniqueNames);
    assert_eq!(err.step_names(), vec!["A"]);
}

#[test]
fn test_unresolved_reference() {
    let steps = vec![code("A"), router("R", &[&["missing"]])];

    let err = Validator::validate(&trigger(&["A", "R"]), &steps).unwrap_err();

    assert_eq!(
        err,
        StructuralIntegrityError::UnresolvedReference {
            name: "missing".to_string(),
            referenced_by: "R".to_string(),
        }
    );
    assert_eq!(err.invariant(), Invariant::NameResolution);
}

#[test]
fn test_unresolved_reference_from_trigger() {
    let err = Validator::validate(&trigger(&["ghost"]), &[]).unwrap_err();

    assert_eq!(err.invariant(), Invariant::NameResolution);
    assert_eq!(err.step_names(), vec!["ghost", "trigger"]);
}

#[test]
fn test_step_referenced_twice() {
    let steps = vec![looped("L", &["A"]), code("A")];

    let err = Validator::validate(&trigger(&["L", "A"]), &steps).unwrap_err();

    assert_eq!(
        err,
        StructuralIntegrityError::MultiplyReferenced {
            name: "A".to_string(),
            first_parent: "trigger".to_string(),
            second_parent: "L".to_string(),
        }
    );
    assert_eq!(err.invariant(), Invariant::Reachability);
}

#[test]
fn test_orphan_step() {
    let steps = vec![code("A"), code("B")];

    let err = Validator::validate(&trigger(&["A"]), &steps).unwrap_err();

    assert_eq!(
        err,
        StructuralIntegrityError::OrphanStep {
            name: "B".to_string()
        }
    );
}

#[test]
fn test_detached_cycle_is_orphaned() {
    // X and Y own each other but nothing reaches them from the trigger
    let steps = vec![code("A"), looped("X", &["Y"]), looped("Y", &["X"])];

    let err = Validator::validate(&trigger(&["A"]), &steps).unwrap_err();

    assert_eq!(err.invariant(), Invariant::Reachability);
    assert!(matches!(err, StructuralIntegrityError::OrphanStep { .. }));
}

#[test]
fn test_branches_key_in_router_settings() {
    let mut r = router("R", &[&[]]);
    if let StepKind::Router { settings, .. } = &mut r.kind {
        settings.insert("branches".to_string(), json!([]));
    }

    let err = Validator::validate(&trigger(&["R"]), &[r]).unwrap_err();

    assert_eq!(
        err,
        StructuralIntegrityError::BranchesInRouterSettings {
            name: "R".to_string()
        }
    );
    assert_eq!(err.invariant(), Invariant::RouterSettings);
}

#[test]
fn test_branches_key_allowed_on_non_router() {
    let mut c = code("A");
    if let StepKind::Code { settings } = &mut c.kind {
        settings.insert("branches".to_string(), json!("not structural"));
    }

    Validator::validate(&trigger(&["A"]), &[c]).expect("only routers are restricted");
}

#[test]
fn test_chain_order_mismatch_against_source() {
    let source = TriggerBuilder::new("trigger")
        .then(StepBuilder::code("A").build())
        .then(StepBuilder::code("B").build())
        .build();
    let (mut flat, steps) = normalize(&source);
    flat.steps.reverse();

    let err = Validator::validate_against(&source, &flat, &steps).unwrap_err();

    assert_eq!(
        err,
        StructuralIntegrityError::ChainOrderMismatch {
            owner: "trigger".to_string(),
            expected: vec!["A".to_string(), "B".to_string()],
            found: vec!["B".to_string(), "A".to_string()],
        }
    );
    assert_eq!(err.invariant(), Invariant::Ordering);
}

#[test]
fn test_branch_order_mismatch_against_source() {
    let source = TriggerBuilder::new("trigger")
        .then(
            StepBuilder::router("R")
                .branch(
                    BranchMeta::condition("x"),
                    vec![StepBuilder::code("A").build(), StepBuilder::code("B").build()],
                )
                .build(),
        )
        .build();
    let (flat, mut steps) = normalize(&source);
    if let StepKind::Router { branches, .. } = &mut steps[0].kind {
        branches[0].steps.reverse();
    }

    let err = Validator::validate_against(&source, &flat, &steps).unwrap_err();

    assert_eq!(err.invariant(), Invariant::Ordering);
    assert_eq!(err.step_names(), vec!["R"]);
}

fn two_branch_source() -> stepflow::dsl::LegacyTrigger {
    TriggerBuilder::new("trigger")
        .then(
            StepBuilder::router("R")
                .branch(BranchMeta::condition("a"), vec![StepBuilder::code("X").build()])
                .branch(BranchMeta::fallback("b"), vec![])
                .build(),
        )
        .build()
}

#[test]
fn test_dropped_branch_against_source() {
    let source = two_branch_source();
    let (flat, mut steps) = normalize(&source);
    if let StepKind::Router { branches, .. } = &mut steps[0].kind {
        branches.truncate(1);
    }

    let err = Validator::validate_against(&source, &flat, &steps).unwrap_err();

    assert_eq!(
        err,
        StructuralIntegrityError::BranchCountMismatch {
            router: "R".to_string(),
            expected: 2,
            found: 1,
        }
    );
    assert_eq!(err.invariant(), Invariant::Ordering);
    assert_eq!(err.step_names(), vec!["R"]);
}

#[test]
fn test_relabeled_branch_against_source() {
    let source = two_branch_source();
    let (flat, mut steps) = normalize(&source);
    if let StepKind::Router { branches, .. } = &mut steps[0].kind {
        branches[1].meta.branch_label = "renamed".to_string();
    }

    let err = Validator::validate_against(&source, &flat, &steps).unwrap_err();

    assert_eq!(
        err,
        StructuralIntegrityError::BranchMetaMismatch {
            router: "R".to_string(),
            position: 1,
        }
    );
}

#[test]
fn test_discovery_order_mismatch_against_source() {
    let source = TriggerBuilder::new("trigger")
        .then(StepBuilder::code("A").build())
        .then(StepBuilder::code("B").build())
        .build();
    let (flat, mut steps) = normalize(&source);
    steps.swap(0, 1);

    let err = Validator::validate_against(&source, &flat, &steps).unwrap_err();

    assert_eq!(
        err,
        StructuralIntegrityError::DiscoveryOrderMismatch {
            position: 0,
            expected: "A".to_string(),
            found: "B".to_string(),
        }
    );
}

#[test]
fn test_kind_mismatch_against_source() {
    let source = TriggerBuilder::new("trigger")
        .then(StepBuilder::piece("A").build())
        .build();
    let (flat, mut steps) = normalize(&source);
    steps[0].kind = StepKind::Code {
        settings: Settings::new(),
    };

    let err = Validator::validate_against(&source, &flat, &steps).unwrap_err();

    assert!(matches!(err, StructuralIntegrityError::KindMismatch { .. }));
    assert!(err.to_string().contains("PIECE"));
}

#[test]
fn test_duplicate_names_in_source_are_rejected() {
    let source = TriggerBuilder::new("trigger")
        .then(StepBuilder::code("A").build())
        .then(
            StepBuilder::loop_on_items("L")
                .body(vec![StepBuilder::code("A").build()])
                .build(),
        )
        .build();
    let (flat, steps) = normalize(&source);

    let err = Validator::validate_against(&source, &flat, &steps).unwrap_err();

    assert_eq!(err.invariant(), Invariant::UniqueNames);
}

#[test]
fn test_error_message_names_invariant() {
    let err = StructuralIntegrityError::OrphanStep {
        name: "step_3".to_string(),
    };

    assert_eq!(
        err.to_string(),
        "[reachability] step 'step_3' is not reachable from the trigger"
    );
}
