use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Represents a Pointer to another Parse object.
/// Pointers are how the server refers to an object it has not embedded.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Pointer {
    #[serde(rename = "__type")]
    pub __type: String, // Should always be "Pointer"
    #[serde(rename = "className")]
    pub class_name: String,
    #[serde(rename = "objectId")]
    pub object_id: String,
}

impl Pointer {
    /// Creates a new Pointer.
    pub fn new(class_name: impl Into<String>, object_id: impl Into<String>) -> Self {
        Pointer {
            __type: "Pointer".to_string(),
            class_name: class_name.into(),
            object_id: object_id.into(),
        }
    }

    /// Reads a pointer out of a JSON value, if it is one.
    pub fn from_json(value: &Value) -> Option<Self> {
        if value.get("__type").and_then(Value::as_str) != Some("Pointer") {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }
}
