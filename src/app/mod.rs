// Application layer: orchestration on top of the registration core.

pub mod batch;
