pub mod model;
pub mod server;
pub mod version;
pub mod web;
