use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rgba8Premul {
    /// Red channel premultiplied by alpha.
    pub r: u8,
    /// Green channel premultiplied by alpha.
    pub g: u8,
    /// Blue channel premultiplied by alpha.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8Premul {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    /// Opaque black. Source artwork is drawn in this color.
    pub const BLACK: Self = Self {
        r: 0,
        g: 0,
        b: 0,
        a: 255,
    };

    /// Fully transparent black.
    pub fn transparent() -> Self {
        Self::TRANSPARENT
    }

    /// Opaque color from straight RGB.
    pub fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Convert straight-alpha RGBA8 into premultiplied RGBA8.
    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }

        Self {
            r: premul(r, a),
            g: premul(g, a),
            b: premul(b, a),
            a,
        }
    }

    /// Channels as `[r, g, b, a]`.
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Alpha is 255.
    pub fn is_opaque(self) -> bool {
        self.a == 255
    }

    /// Alpha is 0.
    pub fn is_transparent(self) -> bool {
        self.a == 0
    }
}

impl fmt::Display for Rgba8Premul {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }
}

/// Process-unique task identity. Never reused within one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub(crate) u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Access raw 64-bit identifier.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Closed set of task kinds in a texture graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskKind {
    /// Rasterized vector source.
    Source,
    /// Recolor and/or opacity change of one image.
    Repaint,
    /// Back-to-front layer composite.
    Stack,
    /// Vertical filmstrip of animation frames.
    Animate,
    /// PNG encoding of one image.
    Encode,
    /// File write sink.
    Output,
}

impl TaskKind {
    /// Every kind, in declaration order.
    pub const ALL: [TaskKind; 6] = [
        TaskKind::Source,
        TaskKind::Repaint,
        TaskKind::Stack,
        TaskKind::Animate,
        TaskKind::Encode,
        TaskKind::Output,
    ];

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Stable lowercase label used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Source => "source",
            TaskKind::Repaint => "repaint",
            TaskKind::Stack => "stack",
            TaskKind::Animate => "animate",
            TaskKind::Encode => "encode",
            TaskKind::Output => "output",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
