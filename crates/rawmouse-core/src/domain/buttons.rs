//! Button identifiers and Raw Input button-flag decoding.

/// Button number as it appears in the `pressed` / `released` bytes of a
/// poll record. 0 means "no button".
pub type ButtonId = u8;

pub const BUTTON_LEFT: ButtonId = 1;
pub const BUTTON_RIGHT: ButtonId = 2;
pub const BUTTON_MIDDLE: ButtonId = 3;

/// One button transition decoded from a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEdge {
    Pressed(ButtonId),
    Released(ButtonId),
}

impl ButtonEdge {
    /// Returns the `(pressed, released)` byte pair for this edge.
    pub fn as_pair(self) -> (ButtonId, ButtonId) {
        match self {
            ButtonEdge::Pressed(b) => (b, 0),
            ButtonEdge::Released(b) => (0, b),
        }
    }
}

/// Bitmask of button transitions carried by one raw mouse sample
/// (`usButtonFlags` in the Windows `RAWMOUSE` structure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonFlags(pub u16);

impl ButtonFlags {
    pub const LEFT_DOWN: u16 = 0x0001;
    pub const LEFT_UP: u16 = 0x0002;
    pub const RIGHT_DOWN: u16 = 0x0004;
    pub const RIGHT_UP: u16 = 0x0008;
    pub const MIDDLE_DOWN: u16 = 0x0010;
    pub const MIDDLE_UP: u16 = 0x0020;
    /// `usButtonData` holds a vertical wheel delta.
    pub const WHEEL: u16 = 0x0400;

    /// Decode order. Left before middle before right, down before up.
    const EDGE_TABLE: [(u16, ButtonEdge); 6] = [
        (Self::LEFT_DOWN, ButtonEdge::Pressed(BUTTON_LEFT)),
        (Self::LEFT_UP, ButtonEdge::Released(BUTTON_LEFT)),
        (Self::MIDDLE_DOWN, ButtonEdge::Pressed(BUTTON_MIDDLE)),
        (Self::MIDDLE_UP, ButtonEdge::Released(BUTTON_MIDDLE)),
        (Self::RIGHT_DOWN, ButtonEdge::Pressed(BUTTON_RIGHT)),
        (Self::RIGHT_UP, ButtonEdge::Released(BUTTON_RIGHT)),
    ];

    /// Returns `true` if the sample carries a vertical wheel delta.
    pub fn has_wheel(&self) -> bool {
        self.0 & Self::WHEEL != 0
    }

    /// Iterates the button edges set in this mask, in decode order.
    ///
    /// X buttons and the horizontal wheel are not mapped.
    pub fn edges(self) -> impl Iterator<Item = ButtonEdge> {
        Self::EDGE_TABLE
            .into_iter()
            .filter(move |(bit, _)| self.0 & bit != 0)
            .map(|(_, edge)| edge)
    }
}
