pub mod source;
pub mod split;
pub mod split_error;
