pub mod calculator;
pub mod conversion;
pub mod dataset;
pub mod db;
pub mod error;
pub mod food_master;
pub mod models;
pub mod providers;
pub mod scorer;
pub mod service;
pub mod text;
