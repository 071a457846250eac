use crate::dsl::{LegacyStep, LegacyStepKind, LegacyTrigger, RouterSettings};
use crate::flow::{BranchMeta, Settings, TriggerKind};
use serde_json::Value;

/// Links `steps` into a pointer chain and returns its head.
/// Any `next_action` already set on the given steps is replaced.
pub fn link(steps: Vec<LegacyStep>) -> Option<Box<LegacyStep>> {
    steps.into_iter().rev().fold(None, |next, mut step| {
        step.next_action = next;
        Some(Box::new(step))
    })
}

pub struct TriggerBuilder {
    name: String,
    display_name: String,
    valid: bool,
    kind: TriggerKind,
    settings: Settings,
    steps: Vec<LegacyStep>,
}

impl TriggerBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: name.to_string(),
            valid: true,
            kind: TriggerKind::Empty,
            settings: Settings::new(),
            steps: Vec::new(),
        }
    }

    pub fn display_name(mut self, display_name: &str) -> Self {
        self.display_name = display_name.to_string();
        self
    }

    pub fn valid(mut self, valid: bool) -> Self {
        self.valid = valid;
        self
    }

    pub fn kind(mut self, kind: TriggerKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn setting(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.settings.insert(key.to_string(), value.into());
        self
    }

    /// Appends a step to the top-level chain.
    pub fn then(mut self, step: LegacyStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn build(self) -> LegacyTrigger {
        LegacyTrigger {
            name: self.name,
            display_name: self.display_name,
            valid: self.valid,
            kind: self.kind,
            settings: self.settings,
            next_action: link(self.steps),
        }
    }
}

pub struct StepBuilder {
    step: LegacyStep,
}

impl StepBuilder {
    fn with_kind(name: &str, kind: LegacyStepKind) -> Self {
        Self {
            step: LegacyStep {
                name: name.to_string(),
                display_name: name.to_string(),
                valid: true,
                skip: false,
                kind,
                next_action: None,
            },
        }
    }

    pub fn code(name: &str) -> Self {
        Self::with_kind(
            name,
            LegacyStepKind::Code {
                settings: Settings::new(),
            },
        )
    }

    pub fn piece(name: &str) -> Self {
        Self::with_kind(
            name,
            LegacyStepKind::Piece {
                settings: Settings::new(),
            },
        )
    }

    pub fn router(name: &str) -> Self {
        Self::with_kind(
            name,
            LegacyStepKind::Router {
                settings: RouterSettings::default(),
                children: Vec::new(),
            },
        )
    }

    pub fn loop_on_items(name: &str) -> Self {
        Self::with_kind(
            name,
            LegacyStepKind::LoopOnItems {
                settings: Settings::new(),
                first_loop_action: None,
            },
        )
    }

    pub fn display_name(mut self, display_name: &str) -> Self {
        self.step.display_name = display_name.to_string();
        self
    }

    pub fn valid(mut self, valid: bool) -> Self {
        self.step.valid = valid;
        self
    }

    pub fn skip(mut self, skip: bool) -> Self {
        self.step.skip = skip;
        self
    }

    pub fn setting(mut self, key: &str, value: impl Into<Value>) -> Self {
        let settings = match &mut self.step.kind {
            LegacyStepKind::Code { settings }
            | LegacyStepKind::Piece { settings }
            | LegacyStepKind::LoopOnItems { settings, .. } => settings,
            LegacyStepKind::Router { settings, .. } => &mut settings.rest,
        };
        settings.insert(key.to_string(), value.into());
        self
    }

    /// Adds a router branch whose chain is `steps`. An empty chain is stored as a null child.
    pub fn branch(mut self, meta: BranchMeta, steps: Vec<LegacyStep>) -> Self {
        if let LegacyStepKind::Router { settings, children } = &mut self.step.kind {
            settings.branches.push(meta);
            children.push(link(steps).map(|head| *head));
        }
        self
    }

    /// Adds branch metadata without a positional child, leaving `children` shorter than `branches`.
    pub fn branch_without_child(mut self, meta: BranchMeta) -> Self {
        if let LegacyStepKind::Router { settings, .. } = &mut self.step.kind {
            settings.branches.push(meta);
        }
        self
    }

    /// Pushes a raw positional child without branch metadata.
    pub fn child(mut self, head: Option<LegacyStep>) -> Self {
        if let LegacyStepKind::Router { children, .. } = &mut self.step.kind {
            children.push(head);
        }
        self
    }

    /// Sets the loop body chain.
    pub fn body(mut self, steps: Vec<LegacyStep>) -> Self {
        if let LegacyStepKind::LoopOnItems {
            first_loop_action, ..
        } = &mut self.step.kind
        {
            *first_loop_action = link(steps);
        }
        self
    }

    pub fn build(self) -> LegacyStep {
        self.step
    }
}
