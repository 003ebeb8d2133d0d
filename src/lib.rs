//! Agent Host — onboarding wizard core and the backend proxy it talks to.

pub mod config;
pub mod error;
pub mod proxy;
pub mod relay;
pub mod session;
pub mod store;
pub mod wizard;
