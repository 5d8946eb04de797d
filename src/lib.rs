//! burner-mail: disposable inboxes backed by a third-party email provider.

pub mod blacklist;
pub mod config;
pub mod error;
pub mod metrics;
pub mod providers;
pub mod server;
pub mod store;
