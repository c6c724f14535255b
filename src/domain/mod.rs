// Domain layer: card records and the ports (interfaces) the pipelines depend on.

pub mod model;
pub mod ports;
