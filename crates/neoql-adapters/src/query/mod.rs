//! Request documents.

mod auth;
pub mod request;

pub use auth::AuthContext;
pub use request::{
    Arguments, Field, MutationKind, MutationRequest, Operation, ReadRequest, ReadShape,
    RequestError, SelectionSet, TypeCondition,
};
