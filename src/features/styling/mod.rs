pub mod handler;
pub mod models;
/// 滑动记录、偏好与搭配推荐
pub mod service;

pub use handler::create_styling_router;
pub use service::StylingService;
