pub mod api;
pub mod constants;
pub mod node;
pub mod state;
pub mod worker;

#[cfg(test)]
mod tests;
