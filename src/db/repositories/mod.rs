pub mod artifact;
pub mod comment;
pub mod follow;
pub mod project;
pub mod todo;
pub mod user;
