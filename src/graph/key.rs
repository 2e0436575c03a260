use crate::foundation::core::{Rgba8Premul, TaskId, TaskKind};

/// Structural identity of a task: its operation and the identities of its inputs.
///
/// Inputs are referenced by canonical [`TaskId`], so two keys are equal exactly when they would
/// compute the same value from the same canonical dependencies.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TaskKey {
    Source {
        name: String,
        size: u32,
    },
    Repaint {
        base: TaskId,
        paint: Option<Rgba8Premul>,
        alpha_bits: u32,
    },
    Stack {
        background: Rgba8Premul,
        layers: Vec<TaskId>,
    },
    Animate {
        background: Rgba8Premul,
        frames: Vec<TaskId>,
    },
    Encode {
        base: TaskId,
    },
    Output {
        base: TaskId,
    },
}

impl TaskKey {
    pub fn repaint(base: TaskId, paint: Option<Rgba8Premul>, alpha: f32) -> Self {
        // -0.0 and 0.0 must hash alike.
        let alpha = if alpha == 0.0 { 0.0 } else { alpha };
        Self::Repaint {
            base,
            paint,
            alpha_bits: alpha.to_bits(),
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            Self::Source { .. } => TaskKind::Source,
            Self::Repaint { .. } => TaskKind::Repaint,
            Self::Stack { .. } => TaskKind::Stack,
            Self::Animate { .. } => TaskKind::Animate,
            Self::Encode { .. } => TaskKind::Encode,
            Self::Output { .. } => TaskKind::Output,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graph/key.rs"]
mod tests;
