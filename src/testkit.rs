//! Shared test doubles for the engine tests.
//!
//! `TagEnhancer` stands in for the opaque low-level rewriter: it treats each
//! instruction as a short tag (the injected field name, or the interceptor
//! name for wraps) and "rewrites" a unit by appending `;tag` to its bytes,
//! which makes fold order directly visible in assertions. Tags can be
//! scripted to fail, decline, or panic. Applied tags are marked in the
//! [`EnhanceContext`], so a tag contributed by an earlier rule is declined by
//! later rules instead of being applied twice.
//!
//! `RecordingObserver` captures lifecycle events as compact strings so tests
//! can assert exact per-unit call order (observer delivery is synchronous and
//! inline).

use crate::{
    Applied, CodeUnit, EnhanceContext, EnhanceError, Enhancer, Instruction, LifecycleEvent,
    LifecycleObserver,
};
use std::collections::HashSet;
use std::sync::Mutex;

fn tag(instruction: &Instruction) -> &str {
    match instruction {
        Instruction::WrapMethod { interceptor, .. } => interceptor,
        Instruction::WrapStaticMethod { interceptor, .. } => interceptor,
        Instruction::WrapConstructor { interceptor } => interceptor,
        Instruction::InjectField { field } => field,
    }
}

#[derive(Debug, Default)]
pub(crate) struct TagEnhancer {
    fail_tags: HashSet<String>,
    decline_tags: HashSet<String>,
    panic_tags: HashSet<String>,
}

impl TagEnhancer {
    pub fn failing_on(mut self, tag: &str) -> Self {
        self.fail_tags.insert(tag.to_string());
        self
    }

    pub fn declining_on(mut self, tag: &str) -> Self {
        self.decline_tags.insert(tag.to_string());
        self
    }

    pub fn panicking_on(mut self, tag: &str) -> Self {
        self.panic_tags.insert(tag.to_string());
        self
    }
}

impl Enhancer for TagEnhancer {
    fn apply(
        &self,
        unit: &CodeUnit,
        instructions: &[Instruction],
        ctx: &mut EnhanceContext,
    ) -> Result<Applied, EnhanceError> {
        // Failures first, before any context mutation: a failed application
        // must be side-effect free.
        for instruction in instructions {
            if self.fail_tags.contains(tag(instruction)) {
                return Err(EnhanceError::Apply {
                    unit: unit.name.clone(),
                    instruction: tag(instruction).to_string(),
                    reason: "scripted failure".into(),
                });
            }
            if self.panic_tags.contains(tag(instruction)) {
                panic!("scripted panic for tag `{}`", tag(instruction));
            }
        }

        let mut applied: Vec<&str> = Vec::new();
        for instruction in instructions {
            let t = tag(instruction);
            if self.decline_tags.contains(t) {
                continue;
            }
            if ctx.mark(format!("tag:{t}")) {
                applied.push(t);
            }
        }

        if applied.is_empty() {
            return Ok(Applied::Declined);
        }

        let mut bytes = unit.bytes.clone();
        for t in &applied {
            bytes.push(b';');
            bytes.extend_from_slice(t.as_bytes());
        }
        Ok(Applied::Rewritten(CodeUnit { name: unit.name.clone(), bytes }))
    }
}

#[derive(Debug, Default)]
pub(crate) struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    /// Drain the recorded events in delivery order.
    pub fn take(&self) -> Vec<String> {
        let mut guard = match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::take(&mut *guard)
    }
}

impl LifecycleObserver for RecordingObserver {
    fn on_event(&self, event: &LifecycleEvent<'_>) {
        let name = &event.descriptor().qualified_name;
        let line = match event {
            LifecycleEvent::RuleError { rule, .. } => format!("{}:{}:{}", event.kind(), name, rule),
            _ => format!("{}:{}", event.kind(), name),
        };
        let mut guard = match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push(line);
    }
}
