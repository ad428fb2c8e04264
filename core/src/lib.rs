pub mod config;
pub mod error;
pub mod input;
pub mod observer;
pub mod output;
pub mod split;
pub mod tree;
