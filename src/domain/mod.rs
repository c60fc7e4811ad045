// Domain layer: dataset rows, the modeling table and the ports the pipeline depends on.

pub mod model;
pub mod ports;
pub mod timestamp;
