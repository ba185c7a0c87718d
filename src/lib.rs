pub mod error;
pub mod materialize;
pub mod object;
pub mod query;
pub mod registry;
pub mod subclass;
pub mod types;

pub use error::{ParseError, RegistrationError};
pub use materialize::Materialized;
pub use object::{DataAvailability, ParseObject};
pub use query::ParseQuery;
pub use registry::{
    Constructor, ObjectReference, RegistrationOutcome, RegistryConfig, Resolution,
    SubclassDescriptor, SubclassRegistry,
};
pub use subclass::{ParseObjectLike, ParseSubclass};

pub use types::{ParseDate, Pointer};
