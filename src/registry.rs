// src/registry.rs

use crate::materialize::Materialized;
use crate::object::ParseObject;
use crate::query::ParseQuery;
use crate::subclass::{ParseObjectLike, ParseSubclass};
use crate::{ParseError, RegistrationError};
use serde::Deserialize;
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Classes the server defines itself. They get a default descriptor so they
/// resolve as registered even before the application provides its own type.
pub const BUILTIN_CLASS_NAMES: [&str; 4] = ["_User", "_Role", "_Session", "_Installation"];

/// Options for a [`SubclassRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistryConfig {
    /// Reject class names the server would refuse (anything other than letters,
    /// digits and underscores, or a leading digit).
    pub validate_class_names: bool,
    /// Seed default descriptors for [`BUILTIN_CLASS_NAMES`].
    pub builtin_defaults: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            validate_class_names: true,
            builtin_defaults: true,
        }
    }
}

type BuildFn = dyn Fn(ParseObject) -> Box<dyn ParseObjectLike> + Send + Sync;

/// Builds instances of one concrete type around a fresh [`ParseObject`].
///
/// Two constructors are considered identical when they produce the same type.
#[derive(Clone)]
pub struct Constructor {
    build: Arc<BuildFn>,
    produces: TypeId,
    type_name: &'static str,
}

impl Constructor {
    /// The constructor of a subclass, via [`ParseSubclass::from_object`].
    pub fn of<T: ParseSubclass>() -> Self {
        Self::from_fn(T::from_object)
    }

    /// A constructor producing untyped [`ParseObject`]s.
    pub fn generic() -> Self {
        Self::from_fn(|object: ParseObject| object)
    }

    /// A constructor backed by an arbitrary function, for registering a type
    /// under a class name other than its own.
    pub fn from_fn<T, F>(build: F) -> Self
    where
        T: ParseObjectLike,
        F: Fn(ParseObject) -> T + Send + Sync + 'static,
    {
        Constructor {
            build: Arc::new(move |object| Box::new(build(object)) as Box<dyn ParseObjectLike>),
            produces: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    pub fn produces(&self) -> TypeId {
        self.produces
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn build(&self, object: ParseObject) -> Box<dyn ParseObjectLike> {
        (self.build)(object)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// The active registration for one class name.
#[derive(Debug)]
pub struct SubclassDescriptor {
    class_name: String,
    constructor: Constructor,
    is_default: bool,
}

impl SubclassDescriptor {
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn constructor(&self) -> &Constructor {
        &self.constructor
    }

    /// `true` when seeded automatically rather than registered by the application.
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    /// A new, empty instance tagged with this descriptor's class name.
    pub fn new_instance(&self) -> Box<dyn ParseObjectLike> {
        self.constructor.build(ParseObject::new(&self.class_name))
    }
}

/// The outcome of looking up a class name.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// A descriptor is registered (explicitly or as a default) for the name.
    Registered(Arc<SubclassDescriptor>),
    /// Nothing is registered; instances are untyped objects of this class.
    Generic { class_name: String },
}

impl Resolution {
    pub fn class_name(&self) -> &str {
        match self {
            Resolution::Registered(descriptor) => descriptor.class_name(),
            Resolution::Generic { class_name } => class_name.as_str(),
        }
    }

    pub fn is_registered(&self) -> bool {
        matches!(self, Resolution::Registered(_))
    }

    /// Wraps `object` in the resolved type. Unknown classes, and descriptors
    /// whose constructor produces a plain [`ParseObject`], yield the untyped
    /// representation.
    pub fn instantiate(&self, object: ParseObject) -> Materialized {
        match self {
            Resolution::Registered(descriptor)
                if descriptor.constructor().produces() != TypeId::of::<ParseObject>() =>
            {
                Materialized::Registered(descriptor.constructor().build(object))
            }
            _ => Materialized::Generic(object),
        }
    }

    /// A new, empty, unsaved instance.
    pub fn new_instance(&self) -> Materialized {
        self.instantiate(ParseObject::new(self.class_name()))
    }
}

/// What a call to [`SubclassRegistry::register`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Inserted,
    /// The same type was already registered; nothing changed.
    Unchanged,
    /// A different type was registered and has been replaced.
    Superseded { previous: &'static str },
}

/// Distinguishes a reference to a known remote object from a brand-new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectReference {
    /// An object that has not been saved and so has no id yet.
    New,
    /// An object that exists on the server under this id.
    Existing(String),
}

impl ObjectReference {
    pub fn existing(object_id: impl Into<String>) -> Result<Self, ParseError> {
        let object_id = object_id.into();
        if object_id.is_empty() {
            return Err(ParseError::InvalidInput(
                "Object ID cannot be empty".to_string(),
            ));
        }
        Ok(ObjectReference::Existing(object_id))
    }

    pub fn object_id(&self) -> Option<&str> {
        match self {
            ObjectReference::New => None,
            ObjectReference::Existing(id) => Some(id.as_str()),
        }
    }
}

/// Maps Parse class names to the local types that represent them.
///
/// One registry is created when the data layer starts and shared (usually in
/// an `Arc`) with whatever materializes server responses or builds queries.
/// Entries are never removed; they live as long as the registry.
///
/// Every read and write goes through a single lock, so a registration is
/// visible to all lookups that start after `register` returns.
pub struct SubclassRegistry {
    config: RegistryConfig,
    entries: RwLock<HashMap<String, Arc<SubclassDescriptor>>>,
}

impl Default for SubclassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SubclassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubclassRegistry")
            .field("config", &self.config)
            .field("class_names", &self.registered_class_names())
            .finish()
    }
}

impl SubclassRegistry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        let registry = SubclassRegistry {
            config,
            entries: RwLock::new(HashMap::new()),
        };
        if registry.config.builtin_defaults {
            let mut entries = registry.write_entries();
            for class_name in BUILTIN_CLASS_NAMES {
                entries.insert(
                    class_name.to_string(),
                    Arc::new(SubclassDescriptor {
                        class_name: class_name.to_string(),
                        constructor: Constructor::generic(),
                        is_default: true,
                    }),
                );
            }
        }
        log::debug!(
            "SubclassRegistry initialized (validate_class_names: {}, builtin_defaults: {})",
            registry.config.validate_class_names,
            registry.config.builtin_defaults
        );
        registry
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<SubclassDescriptor>>> {
        self.entries.read().unwrap_or_else(|poisoned| {
            log::warn!("Subclass registry lock was poisoned; continuing with existing entries");
            poisoned.into_inner()
        })
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<SubclassDescriptor>>> {
        self.entries.write().unwrap_or_else(|poisoned| {
            log::warn!("Subclass registry lock was poisoned; continuing with existing entries");
            poisoned.into_inner()
        })
    }

    fn validate_class_name(&self, class_name: &str) -> Result<(), RegistrationError> {
        if class_name.is_empty() {
            return Err(RegistrationError::EmptyClassName);
        }
        if !self.config.validate_class_names {
            return Ok(());
        }
        let valid_start = class_name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        let valid_rest = class_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid_start && valid_rest {
            Ok(())
        } else {
            Err(RegistrationError::InvalidClassName(class_name.to_string()))
        }
    }

    /// Registers `constructor` for `class_name`.
    ///
    /// Registering the type that is already registered is a no-op. Registering
    /// a different type replaces the previous one; the last registration wins.
    pub fn register(
        &self,
        class_name: &str,
        constructor: Constructor,
    ) -> Result<RegistrationOutcome, ParseError> {
        self.insert(class_name, constructor, false)
    }

    /// Registers `T` under `T::parse_class_name()`.
    pub fn register_subclass<T: ParseSubclass>(&self) -> Result<RegistrationOutcome, ParseError> {
        self.register(T::parse_class_name(), Constructor::of::<T>())
    }

    /// Registers a fallback descriptor. It never replaces an existing entry,
    /// and any explicit registration replaces it.
    pub fn register_default(
        &self,
        class_name: &str,
        constructor: Constructor,
    ) -> Result<RegistrationOutcome, ParseError> {
        self.insert(class_name, constructor, true)
    }

    fn insert(
        &self,
        class_name: &str,
        constructor: Constructor,
        is_default: bool,
    ) -> Result<RegistrationOutcome, ParseError> {
        self.validate_class_name(class_name)?;

        let mut entries = self.write_entries();
        let outcome = match entries.get(class_name) {
            Some(_) if is_default => RegistrationOutcome::Unchanged,
            Some(existing)
                if !existing.is_default()
                    && existing.constructor().produces() == constructor.produces() =>
            {
                RegistrationOutcome::Unchanged
            }
            Some(existing) => RegistrationOutcome::Superseded {
                previous: existing.constructor().type_name(),
            },
            None => RegistrationOutcome::Inserted,
        };

        match &outcome {
            RegistrationOutcome::Unchanged => {
                log::debug!(
                    "Class '{}' already registered; keeping {}",
                    class_name,
                    entries
                        .get(class_name)
                        .map(|d| d.constructor().type_name())
                        .unwrap_or_default()
                );
                return Ok(outcome);
            }
            RegistrationOutcome::Superseded { previous } => {
                log::info!(
                    "Class '{}' re-registered: {} replaces {}",
                    class_name,
                    constructor.type_name(),
                    previous
                );
            }
            RegistrationOutcome::Inserted => {
                log::debug!(
                    "Registered {} for class '{}'{}",
                    constructor.type_name(),
                    class_name,
                    if is_default { " (default)" } else { "" }
                );
            }
        }

        entries.insert(
            class_name.to_string(),
            Arc::new(SubclassDescriptor {
                class_name: class_name.to_string(),
                constructor,
                is_default,
            }),
        );
        Ok(outcome)
    }

    /// Looks up the type for `class_name`. Unknown names resolve to the
    /// generic representation; this never fails.
    pub fn resolve_constructor(&self, class_name: &str) -> Resolution {
        match self.descriptor(class_name) {
            Some(descriptor) => Resolution::Registered(descriptor),
            None => Resolution::Generic {
                class_name: class_name.to_string(),
            },
        }
    }

    pub fn descriptor(&self, class_name: &str) -> Option<Arc<SubclassDescriptor>> {
        self.read_entries().get(class_name).cloned()
    }

    pub fn is_registered(&self, class_name: &str) -> bool {
        self.read_entries().contains_key(class_name)
    }

    /// Registered class names, sorted.
    pub fn registered_class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read_entries().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    /// A new, empty, unsaved instance of whatever type represents `class_name`.
    pub fn create(&self, class_name: &str) -> Materialized {
        self.resolve_constructor(class_name).new_instance()
    }

    /// An instance of whatever type represents `class_name`, either unsaved
    /// ([`ObjectReference::New`]) or referring to a remote object without its
    /// data ([`ObjectReference::Existing`]).
    pub fn create_reference(
        &self,
        class_name: &str,
        reference: ObjectReference,
    ) -> Result<Materialized, ParseError> {
        let object = match reference {
            ObjectReference::New => ParseObject::new(class_name),
            ObjectReference::Existing(object_id) if object_id.is_empty() => {
                return Err(ParseError::InvalidInput(
                    "Object ID cannot be empty".to_string(),
                ));
            }
            ObjectReference::Existing(object_id) => ParseObject::without_data(class_name, &object_id),
        };
        Ok(self.resolve_constructor(class_name).instantiate(object))
    }

    /// A query scoped to `class_name`.
    pub fn build_query(&self, class_name: &str) -> ParseQuery {
        ParseQuery::new(class_name)
    }
}
