pub mod auth;
pub mod categories;
pub mod complaints;
pub mod error;
pub mod middleware;
pub mod password;
pub mod policy;
pub mod provision;
pub mod routes;
pub mod state;
pub mod storage;
pub mod token;
pub mod validation;
