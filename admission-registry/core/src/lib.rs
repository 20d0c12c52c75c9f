#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod decision;
pub mod mutate;
mod patch;
pub mod validate;
mod whitelist;

pub use self::{
    decision::{Decision, Status},
    patch::annotations_patch,
    whitelist::Whitelist,
};
pub use json_patch::Patch;

/// Annotation through which an object opts out of mutation.
pub const MUTATE_ANNOTATION: &str = "admission-registry.ydzs.io/mutate";

/// Annotation recording that an object has already been mutated.
pub const STATUS_ANNOTATION: &str = "admission-registry.ydzs.io/status";

pub const STATUS_MUTATED: &str = "mutated";

/// Failures that occur after an admission request has been decoded. Each is
/// reported back to the API server as a 400 decision rather than as a
/// transport error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("admission request missing 'object'")]
    MissingObject,

    #[error("{0}")]
    Decode(#[from] serde_json::Error),

    #[error("Can't handle the kind({0}) object")]
    UnsupportedKind(String),
}
