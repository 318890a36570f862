pub mod config;
pub mod crypto;
pub mod handlers;
pub mod hmac;
pub mod jwt;
pub mod memory;
pub mod oauth_provider;
pub mod provider;
pub mod request;
pub mod resource;
pub mod response;
pub mod strategy;
pub mod types;
pub mod validators;
