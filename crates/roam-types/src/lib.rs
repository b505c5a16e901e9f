pub mod api;
pub mod events;
pub mod models;

pub use models::{AttendanceStatus, RequestStatus, RewardReason, TripStatus, Visibility};
