//! The pane/split tree and its structural operations.

use collections::FxHashMap;
use serde::{Deserialize, Serialize};

/// Current persisted layout format version.
///
/// Version 1 layouts predate tab kinds; they are accepted and migrated
/// forward by [`TerminalLayout::normalize`]. Newer versions are rejected.
pub const LAYOUT_VERSION: u32 = 2;

fn new_node_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// What a tab hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabKind {
    Agent,
    #[default]
    Terminal,
    Diff,
}

/// One tab inside a pane. A tab belongs to exactly one pane at a time;
/// moving it is a remove-then-insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub terminal_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub kind: TabKind,
    /// For diff tabs: the repository-relative path being compared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_path: Option<String>,
}

impl Tab {
    pub fn new(terminal_id: impl Into<String>, title: impl Into<String>, kind: TabKind) -> Self {
        Self {
            id: new_node_id(),
            terminal_id: terminal_id.into(),
            title: title.into(),
            kind,
            diff_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitDirection {
    /// Side by side.
    #[default]
    Row,
    /// Stacked.
    Column,
}

/// A leaf holding an ordered set of tabs. A pane with zero tabs is legal
/// and has no active tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaneNode {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub tabs: Vec<Tab>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_tab_id: Option<String>,
}

impl PaneNode {
    pub fn empty(id: String) -> Self {
        Self {
            id,
            tabs: Vec::new(),
            active_tab_id: None,
        }
    }

    pub fn with_tab(tab: Tab) -> Self {
        let active = tab.id.clone();
        Self {
            id: new_node_id(),
            tabs: vec![tab],
            active_tab_id: Some(active),
        }
    }

    fn fix_active_tab(&mut self) {
        let valid = self
            .active_tab_id
            .as_ref()
            .is_some_and(|active| self.tabs.iter().any(|t| &t.id == active));
        if !valid {
            self.active_tab_id = self.tabs.first().map(|t| t.id.clone());
        }
    }
}

fn default_ratio() -> f64 {
    0.5
}

/// An interior node dividing its rectangle between two subtrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitNode {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub direction: SplitDirection,
    /// Fraction of the rectangle given to `first`, strictly in (0, 1).
    #[serde(default = "default_ratio")]
    pub ratio: f64,
    pub first: Box<LayoutNode>,
    pub second: Box<LayoutNode>,
}

/// A node in the layout tree. Children are exclusively owned; no node
/// appears in two places.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LayoutNode {
    Pane(PaneNode),
    Split(SplitNode),
}

impl LayoutNode {
    pub fn find_pane(&self, pane_id: &str) -> Option<&PaneNode> {
        match self {
            LayoutNode::Pane(pane) => (pane.id == pane_id).then_some(pane),
            LayoutNode::Split(split) => split
                .first
                .find_pane(pane_id)
                .or_else(|| split.second.find_pane(pane_id)),
        }
    }

    pub fn find_pane_mut(&mut self, pane_id: &str) -> Option<&mut PaneNode> {
        match self {
            LayoutNode::Pane(pane) => (pane.id == pane_id).then_some(pane),
            LayoutNode::Split(split) => {
                if split.first.find_pane(pane_id).is_some() {
                    split.first.find_pane_mut(pane_id)
                } else {
                    split.second.find_pane_mut(pane_id)
                }
            }
        }
    }

    /// The pane currently owning `tab_id`, if any.
    pub fn pane_owning_tab_mut(&mut self, tab_id: &str) -> Option<&mut PaneNode> {
        match self {
            LayoutNode::Pane(pane) => pane.tabs.iter().any(|t| t.id == tab_id).then_some(pane),
            LayoutNode::Split(split) => {
                let in_first = split
                    .first
                    .collect_tabs()
                    .iter()
                    .any(|t| t.id == tab_id);
                if in_first {
                    split.first.pane_owning_tab_mut(tab_id)
                } else {
                    split.second.pane_owning_tab_mut(tab_id)
                }
            }
        }
    }

    pub fn first_pane_id(&self) -> &str {
        match self {
            LayoutNode::Pane(pane) => &pane.id,
            LayoutNode::Split(split) => split.first.first_pane_id(),
        }
    }

    pub fn contains_pane(&self, pane_id: &str) -> bool {
        self.find_pane(pane_id).is_some()
    }

    pub fn collect_tabs(&self) -> Vec<&Tab> {
        let mut tabs = Vec::new();
        self.visit_panes(&mut |pane| tabs.extend(pane.tabs.iter()));
        tabs
    }

    pub fn collect_pane_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        self.visit_panes(&mut |pane| ids.push(pane.id.clone()));
        ids
    }

    fn visit_panes<'a>(&'a self, visit: &mut impl FnMut(&'a PaneNode)) {
        match self {
            LayoutNode::Pane(pane) => visit(pane),
            LayoutNode::Split(split) => {
                split.first.visit_panes(visit);
                split.second.visit_panes(visit);
            }
        }
    }

    /// The other child of the split whose direct child is `pane_id`.
    fn sibling_of(&self, pane_id: &str) -> Option<&LayoutNode> {
        let LayoutNode::Split(split) = self else {
            return None;
        };
        if matches!(split.first.as_ref(), LayoutNode::Pane(p) if p.id == pane_id) {
            return Some(&split.second);
        }
        if matches!(split.second.as_ref(), LayoutNode::Pane(p) if p.id == pane_id) {
            return Some(&split.first);
        }
        split
            .first
            .sibling_of(pane_id)
            .or_else(|| split.second.sibling_of(pane_id))
    }

    /// Remove a pane, collapsing its parent split so the sibling subtree
    /// takes the split's place unchanged. `None` when nothing remains.
    fn remove_pane(self, pane_id: &str) -> Option<LayoutNode> {
        match self {
            LayoutNode::Pane(pane) => (pane.id != pane_id).then_some(LayoutNode::Pane(pane)),
            LayoutNode::Split(split) => {
                let first = split.first.remove_pane(pane_id);
                let second = split.second.remove_pane(pane_id);
                match (first, second) {
                    (None, None) => None,
                    (Some(rest), None) | (None, Some(rest)) => Some(rest),
                    (Some(first), Some(second)) => Some(LayoutNode::Split(SplitNode {
                        id: split.id,
                        direction: split.direction,
                        ratio: split.ratio,
                        first: Box::new(first),
                        second: Box::new(second),
                    })),
                }
            }
        }
    }

    /// Replace the named pane with a split of itself and `new_pane`.
    fn split_pane(&mut self, pane_id: &str, direction: SplitDirection, ratio: f64, new_pane: PaneNode) -> bool {
        match self {
            LayoutNode::Pane(pane) if pane.id == pane_id => {
                let old = std::mem::replace(self, LayoutNode::Pane(PaneNode::empty(String::new())));
                *self = LayoutNode::Split(SplitNode {
                    id: new_node_id(),
                    direction,
                    ratio,
                    first: Box::new(old),
                    second: Box::new(LayoutNode::Pane(new_pane)),
                });
                true
            }
            LayoutNode::Pane(_) => false,
            LayoutNode::Split(split) => {
                split.first.split_pane(pane_id, direction, ratio, new_pane.clone())
                    || split.second.split_pane(pane_id, direction, ratio, new_pane)
            }
        }
    }

    fn set_split_ratio(&mut self, split_id: &str, ratio: f64) -> bool {
        match self {
            LayoutNode::Pane(_) => false,
            LayoutNode::Split(split) => {
                if split.id == split_id {
                    split.ratio = ratio;
                    true
                } else {
                    split.first.set_split_ratio(split_id, ratio)
                        || split.second.set_split_ratio(split_id, ratio)
                }
            }
        }
    }

    fn apply_tab_fixes(self, fixes: &FxHashMap<String, TabFix>) -> Option<LayoutNode> {
        match self {
            LayoutNode::Pane(mut pane) => {
                pane.tabs.retain_mut(|tab| {
                    let Some(fix) = fixes.get(&tab.id) else {
                        return true;
                    };
                    if fix.drop {
                        return false;
                    }
                    if let Some(terminal_id) = &fix.terminal_id {
                        tab.terminal_id = terminal_id.clone();
                    }
                    true
                });
                if pane.tabs.is_empty() {
                    return None;
                }
                pane.fix_active_tab();
                Some(LayoutNode::Pane(pane))
            }
            LayoutNode::Split(split) => {
                let first = split.first.apply_tab_fixes(fixes);
                let second = split.second.apply_tab_fixes(fixes);
                match (first, second) {
                    (None, None) => None,
                    (Some(rest), None) | (None, Some(rest)) => Some(rest),
                    (Some(first), Some(second)) => Some(LayoutNode::Split(SplitNode {
                        first: Box::new(first),
                        second: Box::new(second),
                        ..split
                    })),
                }
            }
        }
    }
}

/// Correction applied to a persisted tab whose backing terminal changed
/// or died while the layout was on disk.
#[derive(Debug, Clone, Default)]
pub struct TabFix {
    pub terminal_id: Option<String>,
    pub drop: bool,
}

/// The persisted snapshot of the whole tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalLayout {
    pub version: u32,
    pub root: LayoutNode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focused_pane_id: Option<String>,
}

impl TerminalLayout {
    /// A fresh single-pane layout holding one tab.
    pub fn new(tab: Tab) -> Self {
        let pane = PaneNode::with_tab(tab);
        let focused = pane.id.clone();
        Self {
            version: LAYOUT_VERSION,
            root: LayoutNode::Pane(pane),
            focused_pane_id: Some(focused),
        }
    }

    /// Parse and normalize a persisted layout. `None` when the payload
    /// is unusable (newer version, malformed JSON, no surviving panes).
    pub fn from_json(json: &str) -> Option<Self> {
        let layout: TerminalLayout = serde_json::from_str(json).ok()?;
        layout.normalize()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Validate an untrusted layout: migrate old versions forward, drop
    /// malformed tabs, coerce blank ids and out-of-range ratios, collapse
    /// splits emptied by dropped panes. Never downgrades a version; a
    /// version above [`LAYOUT_VERSION`] is rejected.
    pub fn normalize(self) -> Option<Self> {
        if self.version == 0 || self.version > LAYOUT_VERSION {
            return None;
        }
        let root = normalize_node(self.root)?;
        let mut layout = Self {
            version: LAYOUT_VERSION,
            root,
            focused_pane_id: self.focused_pane_id,
        };
        layout.ensure_focused_pane();
        Some(layout)
    }

    /// Insert a tab into the named pane, creating the pane at the tree
    /// edge when it does not exist yet. The tab becomes active and its
    /// pane focused.
    pub fn insert_tab(&mut self, pane_id: &str, tab: Tab) {
        if let Some(pane) = self.root.find_pane_mut(pane_id) {
            pane.active_tab_id = Some(tab.id.clone());
            pane.tabs.push(tab);
        } else {
            let pane = PaneNode {
                id: pane_id.to_string(),
                active_tab_id: Some(tab.id.clone()),
                tabs: vec![tab],
            };
            let old = std::mem::replace(&mut self.root, LayoutNode::Pane(PaneNode::empty(String::new())));
            self.root = LayoutNode::Split(SplitNode {
                id: new_node_id(),
                direction: SplitDirection::Row,
                ratio: 0.5,
                first: Box::new(old),
                second: Box::new(LayoutNode::Pane(pane)),
            });
        }
        self.focused_pane_id = Some(pane_id.to_string());
    }

    /// Remove a tab. If its pane empties, the pane collapses into its
    /// sibling across the parent split and focus moves into the
    /// surviving subtree. The last pane of the tree is kept as an empty
    /// placeholder instead of leaving the tree rootless.
    pub fn remove_tab(&mut self, tab_id: &str) -> bool {
        let Some(pane) = self.root.pane_owning_tab_mut(tab_id) else {
            return false;
        };
        let pane_id = pane.id.clone();
        pane.tabs.retain(|t| t.id != tab_id);
        pane.fix_active_tab();

        if pane.tabs.is_empty() {
            let fallback = self
                .root
                .sibling_of(&pane_id)
                .map(|sibling| sibling.first_pane_id().to_string());
            let root = std::mem::replace(&mut self.root, LayoutNode::Pane(PaneNode::empty(String::new())));
            match root.remove_pane(&pane_id) {
                Some(rest) => {
                    self.root = rest;
                    if self.focused_pane_id.as_deref() == Some(&pane_id) {
                        self.focused_pane_id = fallback;
                    }
                }
                None => {
                    self.root = LayoutNode::Pane(PaneNode::empty(pane_id.clone()));
                    self.focused_pane_id = Some(pane_id);
                }
            }
        }
        self.ensure_focused_pane();
        true
    }

    /// Split a pane in two, the new pane holding `tab`. Returns the new
    /// pane's id, or `None` when the pane is unknown or the ratio is not
    /// strictly inside (0, 1).
    pub fn split_pane(
        &mut self,
        pane_id: &str,
        direction: SplitDirection,
        ratio: f64,
        tab: Tab,
    ) -> Option<String> {
        if !ratio_in_range(ratio) {
            return None;
        }
        let new_pane = PaneNode::with_tab(tab);
        let new_pane_id = new_pane.id.clone();
        if !self.root.split_pane(pane_id, direction, ratio, new_pane) {
            return None;
        }
        self.focused_pane_id = Some(new_pane_id.clone());
        Some(new_pane_id)
    }

    /// Resize a split. Ratios outside the open interval (0, 1) are
    /// rejected without touching the tree.
    pub fn set_split_ratio(&mut self, split_id: &str, ratio: f64) -> bool {
        if !ratio_in_range(ratio) {
            return false;
        }
        self.root.set_split_ratio(split_id, ratio)
    }

    /// Move a tab between panes (or reorder within one). The tab is
    /// removed from its source before insertion, never shared. The moved
    /// tab becomes active in the target pane.
    pub fn move_tab(
        &mut self,
        source_pane_id: &str,
        target_pane_id: &str,
        tab_id: &str,
        target_index: usize,
    ) -> bool {
        if self.root.find_pane(target_pane_id).is_none() {
            return false;
        }
        let Some(source) = self.root.find_pane_mut(source_pane_id) else {
            return false;
        };
        let Some(position) = source.tabs.iter().position(|t| t.id == tab_id) else {
            return false;
        };
        let tab = source.tabs.remove(position);
        source.fix_active_tab();

        // find_pane_mut(target) cannot fail here: presence was checked
        // above and removing a tab does not remove panes.
        let Some(target) = self.root.find_pane_mut(target_pane_id) else {
            util::debug_panic!("target pane {target_pane_id:?} vanished during move_tab");
            return false;
        };
        let index = target_index.min(target.tabs.len());
        target.active_tab_id = Some(tab.id.clone());
        target.tabs.insert(index, tab);
        true
    }

    /// Repair dead or renumbered tabs after session restore.
    pub fn apply_tab_fixes(&mut self, fixes: &FxHashMap<String, TabFix>) {
        let root = std::mem::replace(&mut self.root, LayoutNode::Pane(PaneNode::empty(String::new())));
        self.root = match root.apply_tab_fixes(fixes) {
            Some(rest) => rest,
            None => LayoutNode::Pane(PaneNode::empty(new_node_id())),
        };
        self.ensure_focused_pane();
    }

    /// Point focus at an existing pane, falling back to the first pane.
    pub fn ensure_focused_pane(&mut self) {
        let valid = self
            .focused_pane_id
            .as_deref()
            .is_some_and(|id| self.root.contains_pane(id));
        if !valid {
            self.focused_pane_id = Some(self.root.first_pane_id().to_string());
        }
    }
}

fn ratio_in_range(ratio: f64) -> bool {
    ratio.is_finite() && ratio > 0.0 && ratio < 1.0
}

fn normalize_tab(mut tab: Tab) -> Option<Tab> {
    if tab.id.trim().is_empty() || tab.terminal_id.trim().is_empty() {
        return None;
    }
    if tab.title.trim().is_empty() {
        tab.title = "Terminal".to_string();
    }
    Some(tab)
}

fn normalize_node(node: LayoutNode) -> Option<LayoutNode> {
    match node {
        LayoutNode::Pane(pane) => {
            let tabs: Vec<Tab> = pane.tabs.into_iter().filter_map(normalize_tab).collect();
            if tabs.is_empty() {
                return None;
            }
            let mut pane = PaneNode {
                id: coerce_id(pane.id),
                tabs,
                active_tab_id: pane.active_tab_id,
            };
            pane.fix_active_tab();
            Some(LayoutNode::Pane(pane))
        }
        LayoutNode::Split(split) => {
            let first = normalize_node(*split.first);
            let second = normalize_node(*split.second);
            match (first, second) {
                (None, None) => None,
                (Some(rest), None) | (None, Some(rest)) => Some(rest),
                (Some(first), Some(second)) => Some(LayoutNode::Split(SplitNode {
                    id: coerce_id(split.id),
                    direction: split.direction,
                    ratio: if ratio_in_range(split.ratio) {
                        split.ratio
                    } else {
                        0.5
                    },
                    first: Box::new(first),
                    second: Box::new(second),
                })),
            }
        }
    }
}

fn coerce_id(id: String) -> String {
    if id.trim().is_empty() {
        new_node_id()
    } else {
        id
    }
}
