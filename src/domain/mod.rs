// Domain layer: core models, outcomes and ports (interfaces).

pub mod model;
pub mod outcome;
pub mod ports;
