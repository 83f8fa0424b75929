//! Per-session context bookkeeping.
//!
//! The registry is the single source of truth binding a logical
//! `(workspace, terminal)` pair to live session state. It is generic
//! over the display-surface handle so the protocol layer never names a
//! concrete UI type and tests can register plain markers.

use collections::FxHashMap;

/// Derive the registry key for a `(workspace, terminal)` pair.
///
/// Both components are trimmed first; if either trims to nothing the
/// key is the empty string and the pair cannot be registered.
pub fn build_terminal_key(workspace_id: &str, terminal_id: &str) -> String {
    let workspace_id = workspace_id.trim();
    let terminal_id = terminal_id.trim();
    if workspace_id.is_empty() || terminal_id.is_empty() {
        return String::new();
    }
    format!("{workspace_id}::{terminal_id}")
}

/// Live bookkeeping for one session, keyed by its terminal key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TerminalContext<H> {
    pub terminal_key: String,
    pub workspace_id: String,
    pub workspace_name: String,
    pub terminal_id: String,
    /// Display surface currently showing this session, if attached.
    pub container: Option<H>,
    pub active: bool,
    pub last_workspace_id: Option<String>,
}

impl<H> TerminalContext<H> {
    pub fn new(workspace_id: impl Into<String>, terminal_id: impl Into<String>) -> Self {
        let workspace_id = workspace_id.into();
        let terminal_id = terminal_id.into();
        Self {
            terminal_key: build_terminal_key(&workspace_id, &terminal_id),
            workspace_id,
            workspace_name: String::new(),
            terminal_id,
            container: None,
            active: false,
            last_workspace_id: None,
        }
    }
}

/// Owns every [`TerminalContext`]. Lookups are total: a missing key
/// reads as empty values, never an error.
#[derive(Debug)]
pub struct TerminalContextRegistry<H> {
    contexts: FxHashMap<String, TerminalContext<H>>,
}

impl<H> Default for TerminalContextRegistry<H> {
    fn default() -> Self {
        Self {
            contexts: FxHashMap::default(),
        }
    }
}

impl<H> TerminalContextRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or update a context. A new key inserts the input
    /// verbatim; an existing key merges field-wise, the input's
    /// non-default fields winning so previously recorded bookkeeping
    /// the caller did not touch survives. Inputs without a valid key
    /// are dropped.
    pub fn ensure_context(&mut self, input: TerminalContext<H>) -> Option<&TerminalContext<H>> {
        if input.terminal_key.is_empty() {
            tracing::warn!(
                workspace_id = %input.workspace_id,
                terminal_id = %input.terminal_id,
                "dropping context without a valid terminal key"
            );
            return None;
        }
        let key = input.terminal_key.clone();
        match self.contexts.entry(key) {
            collections::hash_map::Entry::Vacant(entry) => Some(entry.insert(input)),
            collections::hash_map::Entry::Occupied(entry) => {
                let existing = entry.into_mut();
                if !input.workspace_id.is_empty() {
                    existing.workspace_id = input.workspace_id;
                }
                if !input.workspace_name.is_empty() {
                    existing.workspace_name = input.workspace_name;
                }
                if !input.terminal_id.is_empty() {
                    existing.terminal_id = input.terminal_id;
                }
                if input.container.is_some() {
                    existing.container = input.container;
                }
                if input.active {
                    existing.active = true;
                }
                if input.last_workspace_id.is_some() {
                    existing.last_workspace_id = input.last_workspace_id;
                }
                Some(existing)
            }
        }
    }

    pub fn get_context(&self, terminal_key: &str) -> Option<&TerminalContext<H>> {
        self.contexts.get(terminal_key)
    }

    pub fn get_context_mut(&mut self, terminal_key: &str) -> Option<&mut TerminalContext<H>> {
        self.contexts.get_mut(terminal_key)
    }

    /// Workspace id for a key, empty when unknown.
    pub fn get_workspace_id(&self, terminal_key: &str) -> String {
        self.contexts
            .get(terminal_key)
            .map(|c| c.workspace_id.clone())
            .unwrap_or_default()
    }

    /// Terminal id for a key, empty when unknown.
    pub fn get_terminal_id(&self, terminal_key: &str) -> String {
        self.contexts
            .get(terminal_key)
            .map(|c| c.terminal_id.clone())
            .unwrap_or_default()
    }

    pub fn get_last_workspace_id(&self, terminal_key: &str) -> Option<String> {
        self.contexts
            .get(terminal_key)
            .and_then(|c| c.last_workspace_id.clone())
    }

    /// No-op when the context does not exist.
    pub fn set_last_workspace_id(&mut self, terminal_key: &str, workspace_id: impl Into<String>) {
        if let Some(context) = self.contexts.get_mut(terminal_key) {
            context.last_workspace_id = Some(workspace_id.into());
        }
    }

    /// Remove a context; later lookups behave as if it never existed.
    pub fn delete_context(&mut self, terminal_key: &str) -> Option<TerminalContext<H>> {
        self.contexts.remove(terminal_key)
    }

    /// Snapshot of all keys, safe to iterate while mutating the
    /// registry (broadcasts delete entries mid-walk).
    pub fn keys(&self) -> Vec<String> {
        self.contexts.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Drop every context belonging to a workspace, returning the
    /// removed contexts so the caller can tear their sessions down.
    pub fn release_workspace(&mut self, workspace_id: &str) -> Vec<TerminalContext<H>> {
        let keys: Vec<String> = self
            .contexts
            .iter()
            .filter(|(_, c)| c.workspace_id == workspace_id)
            .map(|(k, _)| k.clone())
            .collect();
        keys.iter()
            .filter_map(|k| self.contexts.remove(k))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use test_case::test_case;

    type Registry = TerminalContextRegistry<u32>;

    #[test_case("ws", "t1", "ws::t1"; "plain")]
    #[test_case("  ws  ", " t1 ", "ws::t1"; "trimmed")]
    #[test_case("", "t1", ""; "empty workspace")]
    #[test_case("ws", "", ""; "empty terminal")]
    #[test_case("   ", "t1", ""; "whitespace workspace")]
    #[test_case("ws", "  ", ""; "whitespace terminal")]
    #[test_case("", "", ""; "both empty")]
    fn terminal_key_cases(workspace: &str, terminal: &str, expected: &str) {
        assert_eq!(build_terminal_key(workspace, terminal), expected);
    }

    #[test]
    fn ensure_inserts_new_context_verbatim() {
        let mut registry = Registry::new();
        let mut input = TerminalContext::new("ws", "t1");
        input.workspace_name = "My Workspace".into();
        input.container = Some(7);

        let stored = registry.ensure_context(input.clone()).unwrap();
        assert_eq!(stored, &input);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn ensure_merges_keeping_untouched_fields() {
        let mut registry = Registry::new();
        let mut first = TerminalContext::new("ws", "t1");
        first.workspace_name = "My Workspace".into();
        first.container = Some(7);
        first.active = true;
        registry.ensure_context(first);

        // Second call only knows the addressing pair.
        let merged = registry
            .ensure_context(TerminalContext::new("ws", "t1"))
            .unwrap();
        assert_eq!(merged.workspace_name, "My Workspace");
        assert_eq!(merged.container, Some(7));
        assert!(merged.active);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn ensure_merge_favors_new_non_default_fields() {
        let mut registry = Registry::new();
        let mut first = TerminalContext::new("ws", "t1");
        first.workspace_name = "Old".into();
        first.container = Some(7);
        registry.ensure_context(first);

        let mut update = TerminalContext::new("ws", "t1");
        update.workspace_name = "New".into();
        update.container = Some(9);
        update.last_workspace_id = Some("ws-prev".into());
        let merged = registry.ensure_context(update).unwrap();

        assert_eq!(merged.workspace_name, "New");
        assert_eq!(merged.container, Some(9));
        assert_eq!(merged.last_workspace_id.as_deref(), Some("ws-prev"));
    }

    #[test]
    fn ensure_rejects_invalid_key() {
        let mut registry = Registry::new();
        assert!(registry.ensure_context(TerminalContext::new("", "t1")).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn lookups_on_missing_key_return_empty_values() {
        let registry = Registry::new();
        assert_eq!(registry.get_workspace_id("nope"), "");
        assert_eq!(registry.get_terminal_id("nope"), "");
        assert_eq!(registry.get_last_workspace_id("nope"), None);
        assert!(registry.get_context("nope").is_none());
    }

    #[test]
    fn set_last_workspace_id_noop_on_missing_key() {
        let mut registry = Registry::new();
        registry.set_last_workspace_id("ghost::t", "ws2");
        assert!(registry.is_empty());

        registry.ensure_context(TerminalContext::new("ws", "t1"));
        registry.set_last_workspace_id("ws::t1", "ws2");
        assert_eq!(
            registry.get_last_workspace_id("ws::t1").as_deref(),
            Some("ws2")
        );
    }

    #[test]
    fn delete_then_lookup_behaves_as_never_existed() {
        let mut registry = Registry::new();
        registry.ensure_context(TerminalContext::new("ws", "t1"));
        assert!(registry.delete_context("ws::t1").is_some());
        assert!(registry.delete_context("ws::t1").is_none());
        assert_eq!(registry.get_workspace_id("ws::t1"), "");
    }

    #[test]
    fn keys_snapshot_survives_mutation_mid_walk() {
        let mut registry = Registry::new();
        registry.ensure_context(TerminalContext::new("ws", "t1"));
        registry.ensure_context(TerminalContext::new("ws", "t2"));
        registry.ensure_context(TerminalContext::new("ws", "t3"));

        for key in registry.keys() {
            registry.delete_context(&key);
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn release_workspace_removes_exactly_matching_contexts() {
        let mut registry = Registry::new();
        registry.ensure_context(TerminalContext::new("ws-a", "t1"));
        registry.ensure_context(TerminalContext::new("ws-a", "t2"));
        registry.ensure_context(TerminalContext::new("ws-b", "t3"));

        let removed = registry.release_workspace("ws-a");
        assert_eq!(removed.len(), 2);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get_terminal_id("ws-b::t3"), "t3");
    }

    proptest! {
        #[test]
        fn key_is_deterministic_and_total(ws in "[a-z0-9 ]{0,12}", term in "[a-z0-9 ]{0,12}") {
            let a = build_terminal_key(&ws, &term);
            let b = build_terminal_key(&ws, &term);
            prop_assert_eq!(&a, &b);
            if ws.trim().is_empty() || term.trim().is_empty() {
                prop_assert_eq!(a.as_str(), "");
            } else {
                prop_assert_eq!(a, format!("{}::{}", ws.trim(), term.trim()));
            }
        }

        #[test]
        fn ensure_twice_never_duplicates(terms in proptest::collection::vec("[a-z]{1,6}", 1..12)) {
            let mut registry = Registry::new();
            for term in &terms {
                registry.ensure_context(TerminalContext::new("ws", term.clone()));
                registry.ensure_context(TerminalContext::new("ws", term.clone()));
            }
            let unique: collections::FxHashSet<&String> = terms.iter().collect();
            prop_assert_eq!(registry.len(), unique.len());
        }
    }
}
