// src/object.rs

use crate::types::{ParseDate, Pointer};
use crate::ParseError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Keys in a server payload that describe the object rather than its data.
pub(crate) const RESERVED_KEYS: [&str; 5] = ["objectId", "createdAt", "updatedAt", "className", "__type"];

/// Whether an object's field data has been loaded from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataAvailability {
    /// Identifier only; nothing fetched yet.
    Unfetched = 0,
    /// A fetch is in flight.
    Fetching = 1,
    /// Field data is present, either fetched or constructed locally.
    Fetched = 2,
    /// The server confirmed a delete. Terminal.
    Deleted = 3,
}

impl DataAvailability {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => DataAvailability::Unfetched,
            1 => DataAvailability::Fetching,
            3 => DataAvailability::Deleted,
            _ => DataAvailability::Fetched,
        }
    }
}

/// Lifecycle state shared between the owner of an object and a fetch running
/// against it. All transitions go through compare-and-swap.
struct AvailabilityCell(AtomicU8);

impl AvailabilityCell {
    fn new(state: DataAvailability) -> Self {
        AvailabilityCell(AtomicU8::new(state as u8))
    }

    fn get(&self) -> DataAvailability {
        DataAvailability::from_u8(self.0.load(Ordering::Acquire))
    }

    fn transition(&self, from: DataAvailability, to: DataAvailability) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Moves to `Fetched` from anything but `Deleted`. Returns the state it left.
    fn complete(&self) -> DataAvailability {
        let previous = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                match DataAvailability::from_u8(raw) {
                    DataAvailability::Deleted => None,
                    _ => Some(DataAvailability::Fetched as u8),
                }
            })
            .unwrap_or_else(|raw| raw);
        DataAvailability::from_u8(previous)
    }

    fn delete(&self) {
        self.0.store(DataAvailability::Deleted as u8, Ordering::Release);
    }
}

impl Clone for AvailabilityCell {
    fn clone(&self) -> Self {
        AvailabilityCell::new(self.get())
    }
}

impl fmt::Debug for AvailabilityCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.get(), f)
    }
}

/// The untyped representation of a row in a Parse class.
///
/// Registered subclasses wrap one of these; unregistered class names are
/// materialized as a bare `ParseObject`.
#[derive(Debug, Clone, Serialize)]
pub struct ParseObject {
    #[serde(skip_serializing)]
    class_name: String,
    #[serde(skip_serializing_if = "Option::is_none", rename = "objectId")]
    object_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "createdAt")]
    created_at: Option<ParseDate>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "updatedAt")]
    updated_at: Option<ParseDate>,
    #[serde(flatten)]
    fields: HashMap<String, Value>,
    #[serde(skip_serializing)]
    dirty_keys: BTreeSet<String>,
    #[serde(skip_serializing)]
    availability: AvailabilityCell,
}

impl ParseObject {
    /// A new, unsaved object. It has no id and all of its (empty) data.
    pub fn new(class_name: &str) -> Self {
        Self::with_state(class_name, None, DataAvailability::Fetched)
    }

    /// A bare reference to an object that exists on the server.
    ///
    /// `is_data_available()` stays `false` until fetched data is applied.
    pub fn without_data(class_name: &str, object_id: &str) -> Self {
        Self::with_state(
            class_name,
            Some(object_id.to_string()),
            DataAvailability::Unfetched,
        )
    }

    fn with_state(class_name: &str, object_id: Option<String>, state: DataAvailability) -> Self {
        ParseObject {
            class_name: class_name.to_string(),
            object_id,
            created_at: None,
            updated_at: None,
            fields: HashMap::new(),
            dirty_keys: BTreeSet::new(),
            availability: AvailabilityCell::new(state),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn object_id(&self) -> Option<&str> {
        self.object_id.as_deref()
    }

    pub fn created_at(&self) -> Option<&ParseDate> {
        self.created_at.as_ref()
    }

    pub fn updated_at(&self) -> Option<&ParseDate> {
        self.updated_at.as_ref()
    }

    /// A pointer to this object, once it has an id.
    pub fn to_pointer(&self) -> Option<Pointer> {
        self.object_id
            .as_ref()
            .map(|id| Pointer::new(self.class_name.as_str(), id.as_str()))
    }

    // --- Lifecycle ---

    pub fn availability(&self) -> DataAvailability {
        self.availability.get()
    }

    pub fn is_data_available(&self) -> bool {
        self.availability.get() == DataAvailability::Fetched
    }

    /// Claims the object for a fetch. Returns `false` unless it was `Unfetched`,
    /// so concurrent callers can race for it and only one wins.
    pub fn begin_fetch(&self) -> bool {
        self.availability
            .transition(DataAvailability::Unfetched, DataAvailability::Fetching)
    }

    /// Releases a claim taken by [`begin_fetch`](Self::begin_fetch) after the fetch failed.
    pub fn abort_fetch(&self) -> bool {
        self.availability
            .transition(DataAvailability::Fetching, DataAvailability::Unfetched)
    }

    /// Records a successful remote delete.
    pub fn mark_deleted(&self) {
        self.availability.delete();
    }

    /// Applies a server payload for this object and marks its data available.
    ///
    /// Keys changed locally since the last save keep their local value.
    pub fn apply_fetched(&mut self, payload: &Map<String, Value>) -> Result<(), ParseError> {
        if self.availability() == DataAvailability::Deleted {
            return Err(ParseError::InvalidInput(format!(
                "Cannot apply fetched data to deleted {} object",
                self.class_name
            )));
        }

        // Validate everything before touching the object so a bad payload
        // leaves it as it was.
        let incoming_id = match payload.get("objectId") {
            Some(incoming) => Some(incoming.as_str().ok_or_else(|| {
                ParseError::InvalidInput(format!("objectId must be a string, got {}", incoming))
            })?),
            None => None,
        };
        if let (Some(current), Some(incoming)) = (&self.object_id, incoming_id) {
            if current != incoming {
                return Err(ParseError::InvalidInput(format!(
                    "Fetched objectId '{}' does not match '{}'",
                    incoming, current
                )));
            }
        }
        let created_at = payload.get("createdAt").map(ParseDate::from_json).transpose()?;
        let updated_at = payload.get("updatedAt").map(ParseDate::from_json).transpose()?;

        if self.object_id.is_none() {
            self.object_id = incoming_id.map(str::to_string);
        }
        if created_at.is_some() {
            self.created_at = created_at;
        }
        if updated_at.is_some() {
            self.updated_at = updated_at;
        }

        for (key, value) in payload {
            if RESERVED_KEYS.contains(&key.as_str()) || self.dirty_keys.contains(key) {
                continue;
            }
            self.fields.insert(key.clone(), value.clone());
        }

        let previous = self.availability.complete();
        log::debug!(
            "Applied fetched data to {} {:?} ({:?} -> Fetched)",
            self.class_name,
            self.object_id,
            previous
        );
        Ok(())
    }

    /// Records a successful save: the object takes its server id, pending
    /// changes are cleared and its data is available.
    pub fn mark_saved(&mut self, object_id: &str, updated_at: ParseDate) -> Result<(), ParseError> {
        if object_id.is_empty() {
            return Err(ParseError::InvalidInput(
                "Object ID cannot be empty".to_string(),
            ));
        }
        if self.created_at.is_none() {
            self.created_at = Some(updated_at.clone());
        }
        self.object_id = Some(object_id.to_string());
        self.updated_at = Some(updated_at);
        self.dirty_keys.clear();
        self.availability.complete();
        Ok(())
    }

    // --- Field access ---

    /// Reads a field. Objects without data report every field as missing.
    pub fn get<T: DeserializeOwned>(&self, field_name: &str) -> Option<T> {
        if !self.is_visible(field_name) {
            return None;
        }
        self.fields
            .get(field_name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn contains_key(&self, field_name: &str) -> bool {
        self.is_visible(field_name) && self.fields.contains_key(field_name)
    }

    /// Names of the readable fields, following the same rule as [`get`](Self::get).
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields().map(|(key, _)| key)
    }

    /// The readable fields as raw JSON, following the same rule as [`get`](Self::get).
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields
            .iter()
            .filter(move |(key, _)| self.is_visible(key))
            .map(|(key, value)| (key.as_str(), value))
    }

    fn is_visible(&self, field_name: &str) -> bool {
        self.is_data_available() || self.dirty_keys.contains(field_name)
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty_keys.is_empty()
    }

    pub fn dirty_keys(&self) -> impl Iterator<Item = &str> {
        self.dirty_keys.iter().map(String::as_str)
    }

    fn put(&mut self, field_name: &str, value: Value) {
        self.fields.insert(field_name.to_string(), value);
        self.dirty_keys.insert(field_name.to_string());
    }

    pub fn set<T: Serialize>(&mut self, field_name: &str, value: T) -> Result<(), ParseError> {
        if RESERVED_KEYS.contains(&field_name) {
            return Err(ParseError::InvalidInput(format!(
                "'{}' is managed by the server and cannot be set",
                field_name
            )));
        }
        let value = serde_json::to_value(value)?;
        self.put(field_name, value);
        Ok(())
    }

    /// Marks a field for deletion on the next save.
    pub fn unset(&mut self, field_name: &str) {
        self.put(field_name, json!({ "__op": "Delete" }));
    }

    pub fn increment(&mut self, field_name: &str, amount: i64) {
        let op = json!({
            "__op": "Increment",
            "amount": amount
        });
        self.put(field_name, op);
    }

    pub fn decrement(&mut self, field_name: &str, amount: i64) {
        self.increment(field_name, -amount);
    }

    pub fn add_to_array<T: Serialize>(&mut self, field_name: &str, items: &[T]) {
        self.array_op(field_name, "Add", items);
    }

    pub fn add_unique_to_array<T: Serialize>(&mut self, field_name: &str, items: &[T]) {
        self.array_op(field_name, "AddUnique", items);
    }

    pub fn remove_from_array<T: Serialize>(&mut self, field_name: &str, items: &[T]) {
        self.array_op(field_name, "Remove", items);
    }

    fn array_op<T: Serialize>(&mut self, field_name: &str, op: &str, items: &[T]) {
        let op = json!({
            "__op": op,
            "objects": items
        });
        self.put(field_name, op);
    }
}
