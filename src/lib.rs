pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod mail;
pub mod messaging;
pub mod paths;
pub mod phone;
pub mod routes;
pub mod services;
pub mod state;
pub mod validation;

#[cfg(test)]
pub mod testing;
