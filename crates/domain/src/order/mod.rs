//! Orders, their line items and the status state machine.

mod model;
mod status;
mod value_objects;

pub use model::Order;
pub use status::OrderStatus;
pub use value_objects::OrderItem;
