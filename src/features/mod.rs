/// 商品目录：商品 CRUD 与图片生命周期
pub mod catalog;
/// 健康检查
pub mod health;
/// 滑动记录、偏好与搭配推荐
pub mod styling;
