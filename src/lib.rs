//! Client core of the bond portal: authentication session, locale
//! synchronization between device and profile, route gating, and the
//! page-view record helpers, on top of a hosted backend.

pub mod app;
pub mod backend;
pub mod commands;
pub mod config;
pub mod error;
pub mod i18n;
pub mod language_sync;
pub mod records;
pub mod retry;
pub mod routes;
pub mod session;
pub mod storage;
