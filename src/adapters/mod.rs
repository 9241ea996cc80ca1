// Adapters layer: concrete implementations for external systems (store, catalog seeding, roster export).

pub mod catalog;
pub mod memory_store;
pub mod roster_csv;
