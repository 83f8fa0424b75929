//! Split-pane layout for workmux.
//!
//! A recursive pane/split tree describing how terminal sessions are
//! arranged on screen, which tabs belong to which pane, and where focus
//! lives. The tree is exclusively owned: every node appears in exactly
//! one place, and structural edits are in-place rewrites or top-down
//! rebuilds, never shared pointers.

pub mod geometry;
pub mod tree;

pub use geometry::{find_adjacent_pane, pane_positions, Direction, PanePosition};
pub use tree::{
    LayoutNode, PaneNode, SplitDirection, SplitNode, Tab, TabFix, TabKind, TerminalLayout,
    LAYOUT_VERSION,
};

/// Whether a keydown on a pane container should activate the pane.
///
/// Only fires when the pane element itself holds focus (the event target
/// is the element the handler is attached to, not a descendant) and the
/// key is an activation key.
pub fn should_handle_pane_keydown(key: &str, target_is_current: bool) -> bool {
    target_is_current && (key == "Enter" || key == " ")
}
