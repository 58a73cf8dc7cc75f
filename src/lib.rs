//! HopeLine AI - crisis support and wellbeing backend
//!
//! The HTTP service behind the HopeLine site: accounts, support tickets,
//! news, community stories, mood journals, the streaming chat proxy and the
//! contact form. The client-side tools (breathing timer, pose demo, chat
//! stream decoding) live here as library modules too.

pub mod api;
pub mod cache;
pub mod chat;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
