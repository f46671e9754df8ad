#![allow(
    clippy::module_name_repetitions,
    clippy::cast_sign_loss,
    rustdoc::broken_intra_doc_links
)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    unreachable_pub
)]
#![deny(unused_must_use)]
#![doc(test(
    no_crate_inject,
    attr(deny(warnings, rust_2018_idioms), allow(dead_code, unused_variables))
))]

//! A single-instrument market-making client for a JSON-RPC-over-WebSocket derivatives venue.
//!
//! To start a session, parse a venue URI with [`uri::parse`] and connect with
//! [`session::Session::connect`]; drive it with a type implementing
//! [`session::StrategyHooks`], such as [`strategy::MarketMaker`] or [`writer::SubscriptionWriter`].

pub mod book;
pub mod error;
pub mod options;
pub mod request;
pub mod response;
pub mod session;
pub mod strategy;
pub mod uri;
pub mod writer;
pub mod ws;
