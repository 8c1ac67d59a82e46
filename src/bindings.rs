use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::error::BindingError;
use crate::gesture::GestureLabel;

/// The shell no-op. Every label starts bound to it, so dispatch never has to
/// special-case an unbound gesture.
pub const DEFAULT_ACTION: &str = "true";

/// The mutable gesture→command table, shared between the UI thread and the
/// capture loop. Reads clone a snapshot out; neither side ever holds the lock
/// across a frame.
#[derive(Clone)]
pub struct BindingStore {
    inner: Arc<RwLock<IndexMap<GestureLabel, String>>>,
}

impl Default for BindingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BindingStore {
    pub fn new() -> Self {
        let table = GestureLabel::ALL
            .iter()
            .map(|&label| (label, DEFAULT_ACTION.to_string()))
            .collect();
        Self {
            inner: Arc::new(RwLock::new(table)),
        }
    }

    /// Consistent copy of the whole table.
    pub fn snapshot(&self) -> IndexMap<GestureLabel, String> {
        self.inner.read().expect("binding table lock poisoned").clone()
    }

    pub fn get(&self, label: GestureLabel) -> String {
        self.inner.read().expect("binding table lock poisoned")[&label].clone()
    }

    /// Replaces one binding. A blank or whitespace-only action leaves the
    /// prior binding untouched (the editor saves every row as-is, and empty
    /// rows mean "no edit"). Returns whether the binding was applied.
    pub fn set(&self, label: GestureLabel, action: &str) -> bool {
        if action.trim().is_empty() {
            debug!(%label, "ignoring blank binding edit");
            return false;
        }
        self.inner
            .write()
            .expect("binding table lock poisoned")
            .insert(label, action.to_string());
        true
    }

    /// Serializes the full table, keyed by wire name, in the canonical label
    /// order. The order is stable across runs so exports diff cleanly.
    pub fn export(&self) -> Result<Vec<u8>, BindingError> {
        let snapshot = self.snapshot();
        let mut payload: IndexMap<&str, &str> = IndexMap::with_capacity(snapshot.len());
        for label in GestureLabel::ALL {
            payload.insert(label.name(), snapshot[&label].as_str());
        }
        Ok(serde_json::to_vec_pretty(&payload)?)
    }

    /// Parses a payload produced by [`export`](Self::export) (or edited by
    /// hand) and applies every entry whose key is a known label. Unknown keys
    /// are skipped so payloads from newer builds still import. A malformed
    /// payload fails before anything is applied. Returns the number of
    /// bindings applied.
    pub fn import(&self, payload: &[u8]) -> Result<usize, BindingError> {
        let parsed: IndexMap<String, String> = serde_json::from_slice(payload)?;
        let mut applied = 0;
        for (key, action) in &parsed {
            match GestureLabel::from_name(key) {
                Some(label) => {
                    if self.set(label, action) {
                        applied += 1;
                    }
                }
                None => warn!(label = %key, "skipping unknown gesture label in import"),
            }
        }
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_label_starts_bound_to_the_noop() {
        let store = BindingStore::new();
        for label in GestureLabel::ALL {
            assert_eq!(store.get(label), DEFAULT_ACTION);
        }
    }

    #[test]
    fn set_replaces_a_single_binding() {
        let store = BindingStore::new();
        assert!(store.set(GestureLabel::Peace, "xdg-open ."));
        assert_eq!(store.get(GestureLabel::Peace), "xdg-open .");
        assert_eq!(store.get(GestureLabel::Okay), DEFAULT_ACTION);
    }

    #[test]
    fn blank_edits_are_ignored() {
        let store = BindingStore::new();
        store.set(GestureLabel::Fist, "notify-send fist");
        assert!(!store.set(GestureLabel::Fist, ""));
        assert!(!store.set(GestureLabel::Fist, "   \t"));
        assert_eq!(store.get(GestureLabel::Fist), "notify-send fist");
    }

    #[test]
    fn import_of_export_reproduces_the_table() {
        let store = BindingStore::new();
        store.set(GestureLabel::Okay, "cmd_ok");
        store.set(GestureLabel::Rock, "cmd_rock --loud");
        let exported = store.export().unwrap();

        let restored = BindingStore::new();
        let applied = restored.import(&exported).unwrap();
        assert_eq!(applied, GestureLabel::ALL.len());
        assert_eq!(restored.snapshot(), store.snapshot());
    }

    #[test]
    fn export_key_order_is_canonical() {
        let store = BindingStore::new();
        let payload: IndexMap<String, String> =
            serde_json::from_slice(&store.export().unwrap()).unwrap();
        let keys: Vec<&str> = payload.keys().map(String::as_str).collect();
        let expected: Vec<&str> = GestureLabel::ALL.iter().map(|l| l.name()).collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn unknown_labels_are_skipped_not_fatal() {
        let store = BindingStore::new();
        let payload = br#"{"peace": "cmd_p", "teleport": "rm -rf /", "fist": "cmd_f"}"#;
        let applied = store.import(payload).unwrap();
        assert_eq!(applied, 2);
        assert_eq!(store.get(GestureLabel::Peace), "cmd_p");
        assert_eq!(store.get(GestureLabel::Fist), "cmd_f");
    }

    #[test]
    fn malformed_payload_leaves_the_table_unchanged() {
        let store = BindingStore::new();
        store.set(GestureLabel::Stop, "cmd_stop");
        let before = store.snapshot();

        let err = store.import(b"{\"stop\": ").unwrap_err();
        assert!(matches!(err, BindingError::Parse(_)));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn blank_values_in_an_import_are_ignored() {
        let store = BindingStore::new();
        store.set(GestureLabel::CallMe, "cmd_call");
        let applied = store.import(br#"{"call me": "  "}"#).unwrap();
        assert_eq!(applied, 0);
        assert_eq!(store.get(GestureLabel::CallMe), "cmd_call");
    }
}
