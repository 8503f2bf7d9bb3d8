pub mod api;
pub mod config;
pub mod context;
pub mod db;
pub mod middleware;
pub mod models;
pub mod revalidate;
pub mod services;
pub mod storage;
pub mod utils;
