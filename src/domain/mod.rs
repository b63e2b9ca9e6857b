// Domain layer: affinity domain, identifiers, metadata, outcomes and the ports the
// session talks through. Nothing here performs I/O.

pub mod model;
pub mod outcome;
pub mod ports;
