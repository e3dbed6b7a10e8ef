use log::{debug, warn};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use crate::points::{paths, PointValue, ValueKind};

/// A write made by some other bus client
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalWrite {
    pub path: String,
    pub value: Value,
}

/// A point whose value changed since the last flush
#[derive(Debug, Clone, PartialEq)]
pub struct PointChange {
    pub path: String,
    pub value: PointValue,
    pub text: String,
}

#[derive(Debug, Clone)]
struct Point {
    value: PointValue,
    kind: ValueKind,
    writable: bool,
}

/// Current values of all points of one bus service.
///
/// Owned by a single task; every mutation goes through `&mut self`, so there
/// is no locking. Changed paths are collected until `take_changes` hands them
/// to the transport.
pub struct PointService {
    name: String,
    points: BTreeMap<String, Point>,
    dirty: BTreeSet<String>,
}

impl PointService {
    pub fn new(name: String) -> Self {
        return PointService {
            name,
            points: BTreeMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        return &self.name;
    }

    pub fn register_point(&mut self, path: &str, initial: PointValue, kind: ValueKind, writable: bool) {
        if self.points.contains_key(path) {
            warn!("Point {path} registered twice, keeping the first one");
            return;
        }

        debug!("Registering {path} (writable: {writable})");
        self.points.insert(path.to_string(), Point { value: initial, kind, writable });
        self.dirty.insert(path.to_string());
    }

    /// Store a value, returns true if it differs from the current one
    pub fn set_point(&mut self, path: &str, value: PointValue) -> bool {
        let point = match self.points.get_mut(path) {
            Some(p) => p,
            None => {
                warn!("Set on unknown point {path} ignored");
                return false;
            }
        };

        if point.value == value {
            return false;
        }

        point.value = value;
        self.dirty.insert(path.to_string());
        return true;
    }

    pub fn get_point(&self, path: &str) -> Option<&PointValue> {
        return self.points.get(path).map(|p| &p.value);
    }

    /// Text rendering of the current value, the way bus clients display it
    pub fn get_text(&self, path: &str) -> Option<String> {
        return self.points.get(path).map(|p| p.kind.format(&p.value));
    }

    pub fn is_writable(&self, path: &str) -> bool {
        return self.points.get(path).map(|p| p.writable).unwrap_or(false);
    }

    pub fn update_index(&self) -> u8 {
        match self.get_point(paths::UPDATE_INDEX) {
            Some(PointValue::Int(i)) => (*i).clamp(0, 255) as u8,
            _ => 0,
        }
    }

    /// Signal new data to subscribers, 255 wraps to 0
    pub fn bump_update_index(&mut self) -> u8 {
        let next = self.update_index().wrapping_add(1);
        self.set_point(paths::UPDATE_INDEX, PointValue::Int(next as i64));
        return next;
    }

    pub fn has_changes(&self) -> bool {
        return !self.dirty.is_empty();
    }

    pub fn take_changes(&mut self) -> Vec<PointChange> {
        let dirty = std::mem::take(&mut self.dirty);
        let mut changes = Vec::with_capacity(dirty.len());
        for path in dirty {
            if let Some(p) = self.points.get(&path) {
                changes.push(PointChange {
                    text: p.kind.format(&p.value),
                    value: p.value.clone(),
                    path,
                });
            }
        }
        return changes;
    }

    /// Mark changes that could not be handed over as dirty again; the next
    /// `take_changes` renders them with the then current values.
    pub fn requeue(&mut self, changes: Vec<PointChange>) {
        for change in changes {
            self.dirty.insert(change.path);
        }
    }
}
