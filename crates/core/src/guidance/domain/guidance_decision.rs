use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HorizontalDirection {
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VerticalDirection {
    Up,
    Down,
}

/// Outcome of one analysis cycle, as shown to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GuidanceDecision {
    Centered,
    Directional {
        horizontal: HorizontalDirection,
        vertical: VerticalDirection,
    },
    NoFaceDetected,
}

impl GuidanceDecision {
    pub fn is_centered(&self) -> bool {
        matches!(self, GuidanceDecision::Centered)
    }

    /// Short stable name, used as a metrics key.
    pub fn kind(&self) -> &'static str {
        match self {
            GuidanceDecision::Centered => "centered",
            GuidanceDecision::Directional { .. } => "directional",
            GuidanceDecision::NoFaceDetected => "no_face",
        }
    }

    /// Default English instruction for this decision.
    pub fn instruction(&self) -> String {
        match self {
            GuidanceDecision::Centered => "Face centered!".to_string(),
            GuidanceDecision::Directional {
                horizontal,
                vertical,
            } => {
                let h = match horizontal {
                    HorizontalDirection::Left => "Move your face left",
                    HorizontalDirection::Right => "Move your face right",
                };
                let v = match vertical {
                    VerticalDirection::Up => "move up",
                    VerticalDirection::Down => "move down",
                };
                format!("{h} and {v}")
            }
            GuidanceDecision::NoFaceDetected => "No face detected".to_string(),
        }
    }
}

impl fmt::Display for GuidanceDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.instruction())
    }
}
