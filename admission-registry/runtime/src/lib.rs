#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use admission_registry_core as core;

mod admission;
mod args;
pub mod bootstrap;
mod metrics;

pub use self::{
    admission::{Admission, MUTATE_PATH, VALIDATE_PATH},
    args::Args,
};
