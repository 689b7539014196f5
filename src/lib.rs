//! A terminal board for the QAtron test-automation control plane.
//!
//! The crate is organized around one piece of shared state, the
//! [`session::SessionStore`], and everything that reads or changes it:
//!
//! - [`client::BoardClient`] attaches the session token to every request and
//!   signs the session out when the server rejects it.
//! - [`router::guard`] decides whether a path renders or redirects to login.
//! - [`board::Board`] caches queries, runs mutations, and renders [`pages`].

pub mod board;
pub mod cache;
pub mod client;
pub mod config;
pub mod models;
pub mod pages;
pub mod router;
pub mod session;
pub mod storage;

pub use board::Board;
