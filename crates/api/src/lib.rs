//! HTTP surface: realm login/logout, the tenant fence, company campaign
//! routes, the public invitation landing, and the wiring behind them.

pub mod app;
pub mod config;
pub mod context;
pub mod cookies;
pub mod middleware;
pub mod realm;
