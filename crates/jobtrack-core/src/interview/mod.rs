//! Interview schedule.

mod model;
mod repository;

pub use model::{Interview, NewInterview};
pub use repository::InterviewRepository;
