pub mod access;
pub mod domain;
pub mod error;
pub mod input;
pub mod protocol;
pub mod views;
