//! # VKinder
//!
//! A VK community bot that finds dating candidates for the people writing to
//! it, shows them one profile at a time and keeps per-user favorites and
//! blacklists in Postgres.

pub mod bot;
pub mod config;
pub mod db;
pub mod dialogue;
pub mod errors;
pub mod filter;
pub mod localization;
pub mod logging;
pub mod repository;
pub mod searcher;
pub mod vk;
