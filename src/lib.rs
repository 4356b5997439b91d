pub mod config;
pub mod database;
pub mod domain;
pub mod logging;
pub mod overpass;
pub mod services;

#[cfg(test)]
mod tests;
