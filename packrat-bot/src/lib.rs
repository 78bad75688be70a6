pub mod admin;
pub mod card;
pub mod cli;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod http;
pub mod info;
pub mod set;
pub mod trade;
pub mod user;
