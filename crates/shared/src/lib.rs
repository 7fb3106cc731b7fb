//! Domain and wire types shared by the loans client crates.

pub mod domain;
pub mod error;
pub mod protocol;
