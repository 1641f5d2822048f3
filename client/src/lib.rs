//! Joke board client.
//!
//! Everything durable lives in a hosted backend (auth provider + row store);
//! this crate keeps the view state in sync with it:
//!
//! - [`backend`]: the `Backend` seam plus REST and in-process implementations
//! - [`auth_events`]: auth-state notifications and scoped subscriptions
//! - [`view`]: the explicit state container and its transitions
//! - [`feed`], [`session`], [`publish`]: the remote flows, as `Board` methods
//! - [`render`]: plain-text views derived from the state
//! - [`board`]: the controller tying a backend to one mounted view

pub mod auth_events;
pub mod backend;
pub mod board;
pub mod error;
pub mod feed;
pub mod publish;
pub mod render;
pub mod session;
pub mod view;

pub use board::Board;
pub use error::BoardError;
pub use publish::PublishOutcome;
pub use view::{BoardState, Notice, Tab};
