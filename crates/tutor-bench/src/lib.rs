pub mod config;
pub mod learner;
pub mod logging;
pub mod session;
