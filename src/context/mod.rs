//! Query execution context
//!
//! Everything a cursor may consult beyond its own state: the storage
//! collaborator, parameter bindings, configuration, metrics and the query
//! deadline. The context is passed explicitly into every cursor operation;
//! there is no ambient current context.

mod bindings;
mod query;

pub use bindings::Bindings;
pub use query::QueryContext;
