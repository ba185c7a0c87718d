// src/materialize.rs

use crate::object::ParseObject;
use crate::registry::{ObjectReference, SubclassRegistry};
use crate::subclass::ParseObjectLike;
use crate::types::Pointer;
use crate::ParseError;
use serde_json::{Map, Value};
use std::any::{Any, TypeId};

/// An object built from a class name, tagged with how its type was chosen.
#[derive(Debug)]
pub enum Materialized {
    /// An instance of the type registered for the class.
    Registered(Box<dyn ParseObjectLike>),
    /// No application type is registered; the untyped representation.
    Generic(ParseObject),
}

impl Materialized {
    pub fn parse_object(&self) -> &ParseObject {
        match self {
            Materialized::Registered(instance) => instance.parse_object(),
            Materialized::Generic(object) => object,
        }
    }

    pub fn parse_object_mut(&mut self) -> &mut ParseObject {
        match self {
            Materialized::Registered(instance) => instance.parse_object_mut(),
            Materialized::Generic(object) => object,
        }
    }

    pub fn class_name(&self) -> &str {
        self.parse_object().class_name()
    }

    pub fn is_registered(&self) -> bool {
        matches!(self, Materialized::Registered(_))
    }

    pub fn is<T: ParseObjectLike>(&self) -> bool {
        match self {
            Materialized::Registered(instance) => instance.is::<T>(),
            Materialized::Generic(_) => TypeId::of::<T>() == TypeId::of::<ParseObject>(),
        }
    }

    pub fn downcast_ref<T: ParseObjectLike>(&self) -> Option<&T> {
        match self {
            Materialized::Registered(instance) => instance.downcast_ref::<T>(),
            Materialized::Generic(object) => (object as &dyn Any).downcast_ref::<T>(),
        }
    }

    pub fn downcast_mut<T: ParseObjectLike>(&mut self) -> Option<&mut T> {
        match self {
            Materialized::Registered(instance) => instance.downcast_mut::<T>(),
            Materialized::Generic(object) => (object as &mut dyn Any).downcast_mut::<T>(),
        }
    }

    /// Takes the concrete value out, or returns `self` unchanged if it is not a `T`.
    pub fn downcast<T: ParseObjectLike>(self) -> Result<T, Materialized> {
        match self {
            Materialized::Registered(instance) => instance
                .downcast::<T>()
                .map(|boxed| *boxed)
                .map_err(Materialized::Registered),
            Materialized::Generic(object) => {
                if TypeId::of::<T>() != TypeId::of::<ParseObject>() {
                    return Err(Materialized::Generic(object));
                }
                let mut slot = Some(object);
                (&mut slot as &mut dyn Any)
                    .downcast_mut::<Option<T>>()
                    .and_then(Option::take)
                    .ok_or_else(|| unreachable!("T is ParseObject"))
            }
        }
    }

    /// Moves the whole instance behind a trait object, whichever variant it is.
    pub fn into_boxed(self) -> Box<dyn ParseObjectLike> {
        match self {
            Materialized::Registered(instance) => instance,
            Materialized::Generic(object) => Box::new(object),
        }
    }
}

impl SubclassRegistry {
    /// Builds an object of `class_name` from a server payload.
    ///
    /// The registered type is used when there is one, the untyped
    /// representation otherwise. An unregistered class name is never an error;
    /// only a malformed `objectId`, `createdAt` or `updatedAt` is.
    pub fn materialize(
        &self,
        class_name: &str,
        payload: &Map<String, Value>,
    ) -> Result<Materialized, ParseError> {
        let resolution = self.resolve_constructor(class_name);
        if !resolution.is_registered() {
            log::debug!(
                "No subclass registered for '{}'; materializing as ParseObject",
                class_name
            );
        }

        let base = match payload.get("objectId").and_then(Value::as_str) {
            Some(object_id) => ParseObject::without_data(class_name, object_id),
            None => ParseObject::new(class_name),
        };
        let mut instance = resolution.instantiate(base);
        instance.parse_object_mut().apply_fetched(payload)?;
        Ok(instance)
    }

    /// Builds an object from a self-describing JSON value: either a full object
    /// carrying `className`, or a `Pointer`, which yields an unfetched reference.
    pub fn materialize_json(&self, value: &Value) -> Result<Materialized, ParseError> {
        if value.get("__type").and_then(Value::as_str) == Some("Pointer") {
            let pointer = Pointer::from_json(value).ok_or_else(|| {
                ParseError::InvalidInput(format!(
                    "Pointer needs a string 'className' and 'objectId', got {}",
                    value
                ))
            })?;
            return self.materialize_pointer(&pointer);
        }
        let payload = value.as_object().ok_or_else(|| {
            ParseError::InvalidInput(format!("Expected a JSON object, got {}", value))
        })?;
        let class_name = payload
            .get("className")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ParseError::InvalidInput("Object payload has no 'className'".to_string())
            })?;
        self.materialize(class_name, payload)
    }

    /// An unfetched reference for the object a pointer names.
    pub fn materialize_pointer(&self, pointer: &Pointer) -> Result<Materialized, ParseError> {
        let reference = ObjectReference::existing(pointer.object_id.as_str())?;
        self.create_reference(&pointer.class_name, reference)
    }

    /// Materializes every entry of a query's `results` array as `class_name`.
    pub fn materialize_results(
        &self,
        class_name: &str,
        results: &[Value],
    ) -> Result<Vec<Materialized>, ParseError> {
        results
            .iter()
            .map(|result| {
                let payload = result.as_object().ok_or_else(|| {
                    ParseError::InvalidInput(format!(
                        "Expected a JSON object in '{}' results, got {}",
                        class_name, result
                    ))
                })?;
                self.materialize(class_name, payload)
            })
            .collect()
    }
}
