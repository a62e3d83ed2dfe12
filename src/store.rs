// Thin re-export module: the store is split into the key/value primitives,
// the Merkle commitment and the three isolated views.

pub mod kv;
pub mod merkle;
pub mod views;

pub use kv::*;
pub use merkle::*;
pub use views::*;
