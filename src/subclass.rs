// src/subclass.rs

use crate::object::ParseObject;
use crate::query::ParseQuery;
use crate::registry::{Resolution, SubclassRegistry};
use crate::{Materialized, ParseError};
use std::any::{Any, TypeId};
use std::fmt;

/// Type-erasure helpers so registered instances can be downcast again.
/// Implemented for every `'static` type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Anything backed by a [`ParseObject`]. This is the object-safe half of the
/// subclassing contract; the registry hands out `Box<dyn ParseObjectLike>`.
pub trait ParseObjectLike: AsAny + fmt::Debug + Send + Sync {
    fn parse_object(&self) -> &ParseObject;
    fn parse_object_mut(&mut self) -> &mut ParseObject;
}

impl ParseObjectLike for ParseObject {
    fn parse_object(&self) -> &ParseObject {
        self
    }

    fn parse_object_mut(&mut self) -> &mut ParseObject {
        self
    }
}

impl dyn ParseObjectLike {
    pub fn is<T: ParseObjectLike>(&self) -> bool {
        <dyn ParseObjectLike as AsAny>::as_any(self).is::<T>()
    }

    pub fn downcast_ref<T: ParseObjectLike>(&self) -> Option<&T> {
        <dyn ParseObjectLike as AsAny>::as_any(self).downcast_ref::<T>()
    }

    pub fn downcast_mut<T: ParseObjectLike>(&mut self) -> Option<&mut T> {
        <dyn ParseObjectLike as AsAny>::as_any_mut(self).downcast_mut::<T>()
    }

    /// Recovers the concrete type, handing the box back unchanged on mismatch.
    pub fn downcast<T: ParseObjectLike>(
        self: Box<Self>,
    ) -> Result<Box<T>, Box<dyn ParseObjectLike>> {
        if self.is::<T>() {
            <dyn ParseObjectLike as AsAny>::into_any(self)
                .downcast::<T>()
                .map_err(|_| unreachable!("T checked by is::<T>()"))
        } else {
            Err(self)
        }
    }
}

/// A strongly-typed local model for one Parse class.
///
/// ```rust
/// use parse_subclassing::{ParseObject, ParseObjectLike, ParseSubclass, SubclassRegistry};
///
/// #[derive(Debug)]
/// struct Game {
///     object: ParseObject,
/// }
///
/// impl ParseObjectLike for Game {
///     fn parse_object(&self) -> &ParseObject { &self.object }
///     fn parse_object_mut(&mut self) -> &mut ParseObject { &mut self.object }
/// }
///
/// impl ParseSubclass for Game {
///     fn parse_class_name() -> &'static str { "Game" }
///     fn from_object(object: ParseObject) -> Self { Game { object } }
/// }
///
/// # fn main() -> Result<(), parse_subclassing::ParseError> {
/// let registry = SubclassRegistry::new();
/// Game::register_subclass(&registry)?;
///
/// let mut game = Game::object(&registry)?;
/// game.parse_object_mut().set("title", "Bughouse")?;
/// assert_eq!(game.parse_object().class_name(), "Game");
/// # Ok(())
/// # }
/// ```
///
/// The factory methods below are scoped to `Self` and require that `Self` is
/// the type currently registered for its class name; otherwise they fail with
/// [`ParseError::PreconditionViolation`].
pub trait ParseSubclass: ParseObjectLike + Sized {
    /// The remote class this type represents.
    fn parse_class_name() -> &'static str;

    /// Wraps a base object already tagged with [`parse_class_name`](Self::parse_class_name).
    fn from_object(object: ParseObject) -> Self;

    /// Registers `Self` for its class name, superseding any earlier registration.
    fn register_subclass(registry: &SubclassRegistry) -> Result<(), ParseError> {
        registry.register_subclass::<Self>().map(|_| ())
    }

    /// A new, empty, unsaved instance.
    fn object(registry: &SubclassRegistry) -> Result<Self, ParseError> {
        ensure_registered::<Self>(registry)?;
        downcast_owned(registry.create(Self::parse_class_name()))
    }

    /// A reference to an existing remote object, without its data.
    ///
    /// No request is made; `is_data_available()` stays `false` until fetched
    /// data is applied.
    fn object_without_data(registry: &SubclassRegistry, object_id: &str) -> Result<Self, ParseError> {
        ensure_registered::<Self>(registry)?;
        let reference = crate::ObjectReference::existing(object_id)?;
        downcast_owned(registry.create_reference(Self::parse_class_name(), reference)?)
    }

    /// A query over this class.
    fn query(registry: &SubclassRegistry) -> Result<ParseQuery, ParseError> {
        ensure_registered::<Self>(registry)?;
        Ok(registry.build_query(Self::parse_class_name()))
    }

    /// A query over this class with constraints applied by `constrain`.
    fn query_with<F>(registry: &SubclassRegistry, constrain: F) -> Result<ParseQuery, ParseError>
    where
        F: FnOnce(&mut ParseQuery),
    {
        let mut query = Self::query(registry)?;
        constrain(&mut query);
        Ok(query)
    }
}

fn ensure_registered<T: ParseSubclass>(registry: &SubclassRegistry) -> Result<(), ParseError> {
    let class_name = T::parse_class_name();
    match registry.resolve_constructor(class_name) {
        Resolution::Registered(descriptor) if descriptor.constructor().produces() == TypeId::of::<T>() => Ok(()),
        Resolution::Registered(descriptor) => Err(ParseError::PreconditionViolation(format!(
            "{} is not the registered type for class '{}' (registered: {})",
            std::any::type_name::<T>(),
            class_name,
            descriptor.constructor().type_name()
        ))),
        Resolution::Generic { .. } => Err(ParseError::PreconditionViolation(format!(
            "{} must be registered with register_subclass before use (class '{}')",
            std::any::type_name::<T>(),
            class_name
        ))),
    }
}

// A registration can be superseded between the check and the construction,
// so the downcast is still fallible.
fn downcast_owned<T: ParseSubclass>(materialized: Materialized) -> Result<T, ParseError> {
    materialized.downcast::<T>().map_err(|other| {
        ParseError::PreconditionViolation(format!(
            "class '{}' was re-registered while constructing {}",
            other.class_name(),
            std::any::type_name::<T>()
        ))
    })
}
