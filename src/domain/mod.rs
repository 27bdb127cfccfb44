//! Domain layer: pure business rules, no I/O.
pub mod aggregates;
pub mod events;
pub mod exchange;
pub mod feed;
pub mod ports;
pub mod search;
pub mod seo;
pub mod value_objects;
