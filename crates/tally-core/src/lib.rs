pub mod ledger;
pub mod notify;
pub mod render;
pub mod session;
pub mod store;
pub mod sync;
pub mod task;

#[cfg(test)]
mod testing;
