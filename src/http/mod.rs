pub mod pool;
pub mod rate_limiter;
pub mod transport;
