use std::fmt::{Display, Formatter};

/// Exact output size of a resize. The source aspect ratio is not kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimension {
    pub width: u32,
    pub height: u32,
}

impl Dimension {
    /// Both sides must be non-zero.
    pub fn new(width: u32, height: u32) -> Option<Dimension> {
        match (width, height) {
            (0, _) | (_, 0) => None,
            _ => Some(Dimension { width, height }),
        }
    }
}

impl Display for Dimension {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
