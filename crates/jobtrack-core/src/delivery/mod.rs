//! Application (delivery) log.

mod model;
mod repository;

pub use model::{Delivery, NewDelivery};
pub use repository::DeliveryRepository;
