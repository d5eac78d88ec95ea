// 数据库模块
// 包含限流计数表的 Postgres 存储实现

pub mod rate_limit;

pub use rate_limit::PgRateLimitStore;
