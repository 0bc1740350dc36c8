//! Live, paginated reply list for a single discussion thread, plus the
//! reference HTTP backend it talks to.
//!
//! The client side is [`view::ThreadView`]: it pages history through a
//! [`client::ReplyApi`], listens on a [`channel::LiveChannel`] room and
//! funnels both into a [`reconciler::Reconciler`], the only writer of the
//! view's [`cache::ReplyCache`].

pub mod auth;
pub mod cache;
pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod hub;
pub mod models;
pub mod openapi;
pub mod pager;
pub mod rate_limit;
pub mod reconciler;
pub mod repo;
pub mod routes;
pub mod scroll;
pub mod service;
pub mod sort;
pub mod view;

// Re-export commonly used items for tests / external users
pub use routes::{config, AppState};
pub use view::{ThreadView, ViewCloser};
