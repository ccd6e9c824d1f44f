//! Stirrin core library: adds the interfaces declared by mixin classes, plus
//! throwing stub methods for their contracts, to the target classes of a
//! compiled archive, so the augmented classes can be compiled against in a
//! development environment before the mixins are applied.
//!
//! Stages run leaves first: [`source::resolver`] resolves names for
//! [`source::mixins`] and [`source::interfaces`], [`signature`] turns
//! resolved types into descriptors, and [`archive`] rewrites the classes.
//! [`pipeline`] drives one run.

pub mod archive;
pub mod classfile;
pub mod config;
pub mod errors;
pub mod models;
pub mod pipeline;
pub mod signature;
pub mod source;
