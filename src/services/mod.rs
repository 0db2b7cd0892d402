pub mod catalog;
pub mod cleanup;
pub mod image_store;
pub mod password;
pub mod rate_limit;
pub mod token;
