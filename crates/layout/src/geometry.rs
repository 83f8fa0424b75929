//! Pane rectangles and directional focus movement.
//!
//! Positions are computed in the unit square from split ratios; the host
//! scales them to pixels. Adjacency works on those rectangles, so focus
//! movement matches what the user sees regardless of tree shape.

use crate::tree::{LayoutNode, SplitDirection};

/// A pane's rectangle within the unit square.
#[derive(Debug, Clone, PartialEq)]
pub struct PanePosition {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Direction of a focus-movement request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Compute every pane's rectangle by walking the tree and dividing each
/// split's rectangle at its ratio.
pub fn pane_positions(root: &LayoutNode) -> Vec<PanePosition> {
    let mut positions = Vec::new();
    walk(root, 0.0, 0.0, 1.0, 1.0, &mut positions);
    positions
}

fn walk(node: &LayoutNode, x: f64, y: f64, w: f64, h: f64, positions: &mut Vec<PanePosition>) {
    match node {
        LayoutNode::Pane(pane) => positions.push(PanePosition {
            id: pane.id.clone(),
            x,
            y,
            w,
            h,
        }),
        LayoutNode::Split(split) => match split.direction {
            SplitDirection::Row => {
                let first_w = w * split.ratio;
                walk(&split.first, x, y, first_w, h, positions);
                walk(&split.second, x + first_w, y, w - first_w, h, positions);
            }
            SplitDirection::Column => {
                let first_h = h * split.ratio;
                walk(&split.first, x, y, w, first_h, positions);
                walk(&split.second, x, y + first_h, w, h - first_h, positions);
            }
        },
    }
}

/// Tolerance for edge comparisons; ratios multiply into small float
/// error and panes sharing an edge must still count as adjacent.
const EDGE_EPSILON: f64 = 0.01;

/// The pane to focus when moving from `current_id` in `direction`:
/// among panes strictly beyond the current pane's edge, the one whose
/// center is closest to the current center on the cross axis.
pub fn find_adjacent_pane(
    current_id: &str,
    direction: Direction,
    positions: &[PanePosition],
) -> Option<String> {
    let current = positions.iter().find(|p| p.id == current_id)?;
    let cx = current.x + current.w / 2.0;
    let cy = current.y + current.h / 2.0;

    let mut candidates: Vec<&PanePosition> = positions
        .iter()
        .filter(|p| p.id != current_id)
        .filter(|p| match direction {
            Direction::Left => p.x + p.w <= current.x + EDGE_EPSILON,
            Direction::Right => p.x >= current.x + current.w - EDGE_EPSILON,
            Direction::Up => p.y + p.h <= current.y + EDGE_EPSILON,
            Direction::Down => p.y >= current.y + current.h - EDGE_EPSILON,
        })
        .collect();

    if candidates.is_empty() {
        return None;
    }

    let horizontal = matches!(direction, Direction::Left | Direction::Right);
    let center = if horizontal { cy } else { cx };
    candidates.sort_by(|a, b| {
        let a_center = if horizontal {
            a.y + a.h / 2.0
        } else {
            a.x + a.w / 2.0
        };
        let b_center = if horizontal {
            b.y + b.h / 2.0
        } else {
            b.x + b.w / 2.0
        };
        (a_center - center)
            .abs()
            .total_cmp(&(b_center - center).abs())
    });

    Some(candidates[0].id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{SplitDirection, Tab, TabKind, TerminalLayout};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use test_case::test_case;

    fn tab(terminal_id: &str) -> Tab {
        Tab::new(terminal_id, "Terminal", TabKind::Terminal)
    }

    /// left | top-right / bottom-right, row ratio 0.4, column ratio 0.5.
    fn three_pane_layout() -> (TerminalLayout, String, String, String) {
        let mut layout = TerminalLayout::new(tab("t1"));
        let left = layout.root.first_pane_id().to_string();
        let right = layout
            .split_pane(&left, SplitDirection::Row, 0.4, tab("t2"))
            .unwrap();
        let bottom_right = layout
            .split_pane(&right, SplitDirection::Column, 0.5, tab("t3"))
            .unwrap();
        (layout, left, right, bottom_right)
    }

    #[test]
    fn single_pane_fills_unit_square() {
        let layout = TerminalLayout::new(tab("t1"));
        let positions = pane_positions(&layout.root);
        assert_eq!(positions.len(), 1);
        let p = &positions[0];
        assert_eq!((p.x, p.y, p.w, p.h), (0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn row_split_divides_at_ratio() {
        let (layout, left, right, bottom_right) = three_pane_layout();
        let positions = pane_positions(&layout.root);

        let find = |id: &str| positions.iter().find(|p| p.id == id).unwrap();
        let l = find(&left);
        assert_eq!((l.x, l.w, l.h), (0.0, 0.4, 1.0));

        let r = find(&right);
        assert_eq!((r.x, r.y, r.h), (0.4, 0.0, 0.5));
        assert!((r.w - 0.6).abs() < 1e-9);

        let br = find(&bottom_right);
        assert_eq!((br.x, br.y), (0.4, 0.5));
    }

    #[test]
    fn adjacent_right_picks_closest_cross_center() {
        let (layout, left, right, bottom_right) = three_pane_layout();
        let positions = pane_positions(&layout.root);

        // Left pane's center is at y=0.5; both right panes tie at
        // centers 0.25/0.75, the sort is stable so the top one wins.
        let next = find_adjacent_pane(&left, Direction::Right, &positions).unwrap();
        assert_eq!(next, right);

        let back = find_adjacent_pane(&right, Direction::Left, &positions).unwrap();
        assert_eq!(back, left);
        let down = find_adjacent_pane(&right, Direction::Down, &positions).unwrap();
        assert_eq!(down, bottom_right);
        let up = find_adjacent_pane(&bottom_right, Direction::Up, &positions).unwrap();
        assert_eq!(up, right);
    }

    #[test_case(Direction::Left; "left edge")]
    #[test_case(Direction::Up; "top edge")]
    fn no_pane_beyond_outer_edge(direction: Direction) {
        let (layout, left, _, _) = three_pane_layout();
        let positions = pane_positions(&layout.root);
        assert_eq!(find_adjacent_pane(&left, direction, &positions), None);
    }

    #[test]
    fn unknown_pane_has_no_neighbors() {
        let (layout, _, _, _) = three_pane_layout();
        let positions = pane_positions(&layout.root);
        assert_eq!(find_adjacent_pane("ghost", Direction::Right, &positions), None);
    }

    #[test]
    fn diagonal_pane_is_not_adjacent_upward() {
        // bottom-right's strict up neighbor is top-right, not left (left
        // spans the full height and fails the edge filter).
        let (layout, left, right, bottom_right) = three_pane_layout();
        let positions = pane_positions(&layout.root);
        let up = find_adjacent_pane(&bottom_right, Direction::Up, &positions).unwrap();
        assert_ne!(up, left);
        assert_eq!(up, right);
    }

    proptest! {
        #[test]
        fn positions_tile_the_unit_square(
            splits in proptest::collection::vec((0.05f64..0.95, any::<bool>()), 0..8),
        ) {
            let mut layout = TerminalLayout::new(tab("seed"));
            for (i, (ratio, row)) in splits.iter().enumerate() {
                let pane_ids = layout.root.collect_pane_ids();
                let target = pane_ids[i % pane_ids.len()].clone();
                let direction = if *row { SplitDirection::Row } else { SplitDirection::Column };
                layout.split_pane(&target, direction, *ratio, tab(&format!("t{i}")));
            }
            let positions = pane_positions(&layout.root);
            prop_assert_eq!(positions.len(), layout.root.collect_pane_ids().len());
            let area: f64 = positions.iter().map(|p| p.w * p.h).sum();
            prop_assert!((area - 1.0).abs() < 1e-6);
            for p in &positions {
                prop_assert!(p.w > 0.0 && p.h > 0.0);
                prop_assert!(p.x >= -1e-9 && p.y >= -1e-9);
                prop_assert!(p.x + p.w <= 1.0 + 1e-9 && p.y + p.h <= 1.0 + 1e-9);
            }
        }
    }
}
