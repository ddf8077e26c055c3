// Domain layer: ledger model, events and ports. No I/O here.

pub mod events;
pub mod model;
pub mod ports;
