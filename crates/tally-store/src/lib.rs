pub mod identity;
pub mod local;
