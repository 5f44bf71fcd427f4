pub mod health;
pub mod redirect;

pub use health::{AppStartTime, HealthService, health_routes};
pub use redirect::{OutContext, OutService, RedirectTier, out_routes};
