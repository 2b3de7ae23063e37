pub mod client;
pub mod common;
pub mod config;
pub mod queue;
pub mod storage;
pub mod web;
