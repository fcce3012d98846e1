//! Copy-on-write shared state shared across units within a single request.
//!
//! A `Blackboard` is a chain of immutable, frozen parent layers plus one
//! mutable-exclusive leaf layer. `clone()` is the central operation: it
//! freezes the current layer and returns a new leaf whose parent is the
//! just-frozen layer, giving O(1) snapshot cost for parallel branches
//! without copying the untyped overlay.

use crate::unit::LobeResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Parent-chain depth at which the next `clone()` auto-flattens instead of
/// extending the chain (spec.md invariant iv).
pub const MAX_DEPTH: u32 = 8;

/// A recalled memory surfaced into this request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub content: String,
    pub source: String,
    pub relevance: f64,
}

/// A parsed entity mention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub entity_type: String,
    pub value: String,
    pub span: (usize, usize),
}

/// A summary of the user's inferred state for this conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserState {
    pub mood: String,
    pub expertise: String,
    pub tone: String,
    pub engagement: f64,
}

/// An overlay slot: either a live value or a tombstone shadowing ancestors.
#[derive(Debug, Clone)]
enum OverlayEntry {
    Value(Value),
    Tombstone,
}

/// The mutable part of a layer, protected by a single reader/writer lock
/// per spec.md's "each layer owns a reader/writer lock protecting its
/// overlay and structured lists".
#[derive(Debug, Default)]
struct LayerData {
    overlay: HashMap<String, OverlayEntry>,
    memories: Vec<Memory>,
    entities: Vec<Entity>,
    user_state: Option<UserState>,
    overall_confidence: f64,
}

struct Inner {
    data: RwLock<LayerData>,
    parent: Option<Arc<Inner>>,
    depth: u32,
    frozen: AtomicBool,
    conversation_id: String,
    turn: u32,
}

/// A handle to one layer of the blackboard chain. Cheap to clone as a
/// pointer (`Blackboard` is itself `Arc`-backed); the CoW snapshot
/// operation is the inherent method [`Blackboard::clone`], not
/// `Clone::clone`; this type intentionally does not derive `Clone` so the
/// two are never confused at a call site.
pub struct Blackboard(Arc<Inner>);

impl Blackboard {
    /// A fresh root: empty overlay, confidence 1.0, depth 0, no parent.
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self::new_root(conversation_id.into(), 0)
    }

    fn new_root(conversation_id: String, turn: u32) -> Self {
        Blackboard(Arc::new(Inner {
            data: RwLock::new(LayerData {
                overall_confidence: 1.0,
                ..Default::default()
            }),
            parent: None,
            depth: 0,
            frozen: AtomicBool::new(false),
            conversation_id,
            turn,
        }))
    }

    pub fn conversation_id(&self) -> &str {
        &self.0.conversation_id
    }

    pub fn turn(&self) -> u32 {
        self.0.turn
    }

    pub fn depth(&self) -> u32 {
        self.0.depth
    }

    pub fn is_root(&self) -> bool {
        self.0.parent.is_none() && self.0.depth == 0
    }

    pub fn is_frozen(&self) -> bool {
        self.0.frozen.load(Ordering::Acquire)
    }

    pub fn overall_confidence(&self) -> f64 {
        self.0.data.read().expect("blackboard lock poisoned").overall_confidence
    }

    fn trap_if_frozen(&self, op: &str) {
        if self.is_frozen() {
            panic!("attempted to {op} a frozen blackboard layer (depth {})", self.0.depth);
        }
    }

    /// Walk overlay-and-parents lookup. O(depth); no allocation beyond the
    /// returned clone of the found value.
    pub fn get(&self, key: &str) -> (Option<Value>, bool) {
        let mut node = &self.0;
        loop {
            let data = node.data.read().expect("blackboard lock poisoned");
            match data.overlay.get(key) {
                Some(OverlayEntry::Value(v)) => return (Some(v.clone()), true),
                Some(OverlayEntry::Tombstone) => return (None, false),
                None => {}
            }
            drop(data);
            match &node.parent {
                Some(p) => node = p,
                None => return (None, false),
            }
        }
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.trap_if_frozen("set() on");
        let mut data = self.0.data.write().expect("blackboard lock poisoned");
        data.overlay.insert(key.into(), OverlayEntry::Value(value));
    }

    pub fn delete(&self, key: impl Into<String>) {
        self.trap_if_frozen("delete() on");
        let mut data = self.0.data.write().expect("blackboard lock poisoned");
        data.overlay.insert(key.into(), OverlayEntry::Tombstone);
    }

    /// Merge a unit's result: write its content under its own unit id key
    /// and multiply the running confidence (spec.md invariant v: the
    /// accumulator only decreases, so non-negative confidences are
    /// required to multiply in).
    pub fn merge(&self, result: &LobeResult) {
        self.trap_if_frozen("merge() into");
        let mut data = self.0.data.write().expect("blackboard lock poisoned");
        data.overlay.insert(
            result.unit_id.to_string(),
            OverlayEntry::Value(result.content.clone()),
        );
        if result.confidence >= 0.0 {
            data.overall_confidence *= result.confidence;
        }
    }

    pub fn add_memory(&self, memory: Memory) {
        self.trap_if_frozen("add_memory() on");
        self.0.data.write().expect("blackboard lock poisoned").memories.push(memory);
    }

    pub fn add_entity(&self, entity: Entity) {
        self.trap_if_frozen("add_entity() on");
        self.0.data.write().expect("blackboard lock poisoned").entities.push(entity);
    }

    pub fn set_user_state(&self, state: UserState) {
        self.trap_if_frozen("set_user_state() on");
        self.0.data.write().expect("blackboard lock poisoned").user_state = Some(state);
    }

    pub fn memories(&self) -> Vec<Memory> {
        self.0.data.read().expect("blackboard lock poisoned").memories.clone()
    }

    pub fn entities(&self) -> Vec<Entity> {
        self.0.data.read().expect("blackboard lock poisoned").entities.clone()
    }

    pub fn user_state(&self) -> Option<UserState> {
        self.0.data.read().expect("blackboard lock poisoned").user_state.clone()
    }

    /// Freeze self and branch: O(1) except for the small, eagerly-copied
    /// structured lists. Auto-flattens once the chain hits [`MAX_DEPTH`].
    pub fn clone(&self) -> Blackboard {
        self.0.frozen.store(true, Ordering::Release);

        if self.0.depth >= MAX_DEPTH {
            return self.flatten();
        }

        let data = self.0.data.read().expect("blackboard lock poisoned");
        let child_data = LayerData {
            overlay: HashMap::new(),
            memories: data.memories.clone(),
            entities: data.entities.clone(),
            user_state: data.user_state.clone(),
            overall_confidence: data.overall_confidence,
        };
        drop(data);

        Blackboard(Arc::new(Inner {
            data: RwLock::new(child_data),
            parent: Some(self.0.clone()),
            depth: self.0.depth + 1,
            frozen: AtomicBool::new(false),
            conversation_id: self.0.conversation_id.clone(),
            turn: self.0.turn,
        }))
    }

    /// Materialize a new root containing every live (non-tombstoned) key
    /// visible from this layer, with no parent chain. O(N) in total key
    /// count across the chain.
    pub fn flatten(&self) -> Blackboard {
        let mut seen: HashMap<String, Option<Value>> = HashMap::new();
        let mut node = &self.0;
        loop {
            let data = node.data.read().expect("blackboard lock poisoned");
            for (k, v) in data.overlay.iter() {
                seen.entry(k.clone()).or_insert_with(|| match v {
                    OverlayEntry::Value(val) => Some(val.clone()),
                    OverlayEntry::Tombstone => None,
                });
            }
            drop(data);
            match &node.parent {
                Some(p) => node = p,
                None => break,
            }
        }

        let self_data = self.0.data.read().expect("blackboard lock poisoned");
        let mut overlay = HashMap::new();
        for (k, v) in seen {
            if let Some(val) = v {
                overlay.insert(k, OverlayEntry::Value(val));
            }
        }
        let flat = LayerData {
            overlay,
            memories: self_data.memories.clone(),
            entities: self_data.entities.clone(),
            user_state: self_data.user_state.clone(),
            overall_confidence: self_data.overall_confidence,
        };
        drop(self_data);

        Blackboard(Arc::new(Inner {
            data: RwLock::new(flat),
            parent: None,
            depth: 0,
            frozen: AtomicBool::new(false),
            conversation_id: self.0.conversation_id.clone(),
            turn: self.0.turn,
        }))
    }

    /// All live keys visible from this layer, deduplicated, tombstones
    /// excluded.
    pub fn keys(&self) -> Vec<String> {
        let mut seen: HashMap<String, bool> = HashMap::new(); // key -> is_live
        let mut node = &self.0;
        loop {
            let data = node.data.read().expect("blackboard lock poisoned");
            for (k, v) in data.overlay.iter() {
                seen.entry(k.clone()).or_insert_with(|| matches!(v, OverlayEntry::Value(_)));
            }
            drop(data);
            match &node.parent {
                Some(p) => node = p,
                None => break,
            }
        }
        seen.into_iter().filter(|(_, live)| *live).map(|(k, _)| k).collect()
    }

    /// A snapshot suitable for logging: metadata plus the flattened data
    /// view. Parents are not serialized.
    pub fn summary(&self) -> BlackboardSummary {
        let flat = self.flatten();
        let flat_data = flat.0.data.read().expect("blackboard lock poisoned");
        let data: HashMap<String, Value> = flat_data
            .overlay
            .iter()
            .filter_map(|(k, v)| match v {
                OverlayEntry::Value(val) => Some((k.clone(), val.clone())),
                OverlayEntry::Tombstone => None,
            })
            .collect();

        BlackboardSummary {
            conversation_id: self.0.conversation_id.clone(),
            turn: self.0.turn,
            depth: self.0.depth,
            frozen: self.is_frozen(),
            overall_confidence: flat_data.overall_confidence,
            data,
            memories: flat_data.memories.clone(),
            entities: flat_data.entities.clone(),
            user_state: flat_data.user_state.clone(),
        }
    }
}

/// The serializable, flattened view of a blackboard used for logging and
/// debugging. No format versioning is prescribed; consumers should treat
/// unknown keys as opaque (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlackboardSummary {
    pub conversation_id: String,
    pub turn: u32,
    pub depth: u32,
    pub frozen: bool,
    pub overall_confidence: f64,
    pub data: HashMap<String, Value>,
    pub memories: Vec<Memory>,
    pub entities: Vec<Entity>,
    pub user_state: Option<UserState>,
}
