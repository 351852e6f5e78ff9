use serde::{Deserialize, Serialize};

use crate::resource::Identifier;

/// Default slot edge length in pixels.
pub const SLOT_SIZE: u32 = 16;

/// Sprite drawn in an empty slot, as an atlas and a sprite within it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotIcon {
    /// Texture atlas.
    pub atlas: Identifier,
    /// Sprite within the atlas.
    pub sprite: Identifier,
}

/// Where and how a slot is drawn in a machine screen.
///
/// Pure data: the storage never reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDisplay {
    /// Left edge, relative to the screen.
    pub x: i32,
    /// Top edge, relative to the screen.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Icon drawn while the slot is empty.
    pub icon: Option<SlotIcon>,
}

impl Default for SlotDisplay {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: SLOT_SIZE,
            height: SLOT_SIZE,
            icon: None,
        }
    }
}

impl SlotDisplay {
    /// Creates a display at `(x, y)` with the default size and no icon.
    #[must_use]
    pub fn at(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }
}
