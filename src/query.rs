// src/query.rs

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{error::ParseError, types::Pointer};

/// A query against one Parse class, built but not executed.
///
/// Whatever sends requests reads [`class_name`](Self::class_name) for the
/// `classes/{className}` endpoint and [`build_query_params`](Self::build_query_params)
/// for the URL parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseQuery {
    class_name: String,
    conditions: Map<String, Value>,
    limit: Option<isize>, // Parse uses -1 for "no limit"
    skip: Option<usize>,
    order: Option<String>,
    include: Option<String>,
    keys: Option<String>,
}

impl ParseQuery {
    /// Creates a new `ParseQuery` for the specified class name.
    pub fn new(class_name: &str) -> Self {
        Self {
            class_name: class_name.to_string(),
            conditions: Map::new(),
            limit: None,
            skip: None,
            order: None,
            include: None,
            keys: None,
        }
    }

    /// Returns the class name this query targets.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The `where` conditions accumulated so far.
    pub fn conditions(&self) -> &Map<String, Value> {
        &self.conditions
    }

    fn add_simple_condition(&mut self, key: &str, value: Value) -> &mut Self {
        self.conditions.insert(key.to_string(), value);
        self
    }

    // Operators on the same key are merged, so `greater_than` + `less_than`
    // yields a range rather than the second replacing the first.
    fn add_operator_condition(&mut self, key: &str, operator: &str, value: Value) -> &mut Self {
        let entry = self
            .conditions
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(op_map) = entry {
            op_map.insert(operator.to_string(), value);
        }
        self
    }

    fn to_json<V: Serialize>(value: V) -> Option<Value> {
        match serde_json::to_value(value) {
            Ok(json_val) => Some(json_val),
            Err(e) => {
                log::warn!("Dropping query constraint that failed to serialize: {}", e);
                None
            }
        }
    }

    /// Adds a constraint to the query that a field must be equal to a specified value.
    pub fn equal_to<V: Serialize>(&mut self, key: &str, value: V) -> &mut Self {
        match Self::to_json(value) {
            Some(json_val) => self.add_simple_condition(key, json_val),
            None => self,
        }
    }

    /// Adds a constraint to the query that a field must not be equal to a specified value.
    pub fn not_equal_to<V: Serialize>(&mut self, key: &str, value: V) -> &mut Self {
        match Self::to_json(value) {
            Some(json_val) => self.add_operator_condition(key, "$ne", json_val),
            None => self,
        }
    }

    pub fn exists(&mut self, key: &str) -> &mut Self {
        self.add_operator_condition(key, "$exists", Value::Bool(true))
    }

    pub fn does_not_exist(&mut self, key: &str) -> &mut Self {
        self.add_operator_condition(key, "$exists", Value::Bool(false))
    }

    pub fn greater_than<V: Serialize>(&mut self, key: &str, value: V) -> &mut Self {
        match Self::to_json(value) {
            Some(json_val) => self.add_operator_condition(key, "$gt", json_val),
            None => self,
        }
    }

    pub fn less_than<V: Serialize>(&mut self, key: &str, value: V) -> &mut Self {
        match Self::to_json(value) {
            Some(json_val) => self.add_operator_condition(key, "$lt", json_val),
            None => self,
        }
    }

    /// Matches objects whose field value is one of `values`.
    pub fn contained_in<V: Serialize>(&mut self, key: &str, values: Vec<V>) -> &mut Self {
        match Self::to_json(values) {
            Some(json_val_array) => self.add_operator_condition(key, "$in", json_val_array),
            None => self,
        }
    }

    /// Matches string fields starting with `prefix`, taken literally.
    pub fn starts_with(&mut self, key: &str, prefix: &str) -> &mut Self {
        self.add_operator_condition(
            key,
            "$regex",
            Value::String(format!("^{}", regex::escape(prefix))),
        )
    }

    /// Matches objects whose pointer field refers to `target`.
    pub fn points_to(&mut self, key: &str, target: &Pointer) -> &mut Self {
        match Self::to_json(target) {
            Some(pointer_json) => self.add_simple_condition(key, pointer_json),
            None => self,
        }
    }

    /// Matches objects whose pointer field refers to an object matched by `inner`.
    pub fn matches_query(&mut self, key: &str, inner: &ParseQuery) -> Result<&mut Self, ParseError> {
        if inner.class_name.is_empty() {
            return Err(ParseError::InvalidInput(
                "Inner query must target a class".to_string(),
            ));
        }
        let mut inner_json = Map::new();
        inner_json.insert("where".to_string(), Value::Object(inner.conditions.clone()));
        inner_json.insert(
            "className".to_string(),
            Value::String(inner.class_name.clone()),
        );
        Ok(self.add_operator_condition(key, "$inQuery", Value::Object(inner_json)))
    }

    // --- Pagination and Sorting ---

    /// Sets the maximum number of results to return.
    pub fn limit(&mut self, count: isize) -> &mut Self {
        self.limit = Some(count);
        self
    }

    /// Sets the number of results to skip before returning.
    pub fn skip(&mut self, count: usize) -> &mut Self {
        self.skip = Some(count);
        self
    }

    /// Sorts the results by a given key in ascending order. Replaces existing sort order.
    pub fn order_by_ascending(&mut self, key: &str) -> &mut Self {
        self.order = Some(key.to_string());
        self
    }

    /// Sorts the results by a given key in descending order. Replaces existing sort order.
    pub fn order_by_descending(&mut self, key: &str) -> &mut Self {
        self.order = Some(format!("-{}", key));
        self
    }

    /// Appends a sort key after any existing ones.
    pub fn add_order(&mut self, key: &str, descending: bool) -> &mut Self {
        let prefix = if descending { "-" } else { "" };
        let new_order_key = format!("{}{}", prefix, key);
        if let Some(existing_order) = &mut self.order {
            if !existing_order.is_empty() {
                existing_order.push(',');
            }
            existing_order.push_str(&new_order_key);
        } else {
            self.order = Some(new_order_key);
        }
        self
    }

    /// Includes nested objects for the given pointer key(s).
    pub fn include(&mut self, keys_to_include: &[&str]) -> &mut Self {
        self.include = Some(Self::merge_key_list(self.include.take(), keys_to_include));
        self
    }

    /// Restricts the fields returned for all matching objects.
    pub fn select(&mut self, keys_to_select: &[&str]) -> &mut Self {
        self.keys = Some(Self::merge_key_list(self.keys.take(), keys_to_select));
        self
    }

    fn merge_key_list(current: Option<String>, extra: &[&str]) -> String {
        let current = current.unwrap_or_default();
        let mut parts: Vec<&str> = current.split(',').filter(|s| !s.is_empty()).collect();
        parts.extend(extra.iter().copied());
        parts.sort_unstable();
        parts.dedup();
        parts.join(",")
    }

    /// URL parameters for a `GET classes/{className}` request.
    pub fn build_query_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if !self.conditions.is_empty() {
            if let Ok(where_json) = serde_json::to_string(&self.conditions) {
                params.push(("where".to_string(), where_json));
            }
        }
        if let Some(limit_val) = self.limit {
            params.push(("limit".to_string(), limit_val.to_string()));
        }
        if let Some(skip_val) = self.skip {
            params.push(("skip".to_string(), skip_val.to_string()));
        }
        if let Some(order_val) = &self.order {
            params.push(("order".to_string(), order_val.clone()));
        }
        if let Some(include_val) = &self.include {
            params.push(("include".to_string(), include_val.clone()));
        }
        if let Some(keys_val) = &self.keys {
            params.push(("keys".to_string(), keys_val.clone()));
        }
        params
    }
}
