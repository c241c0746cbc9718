pub mod cli;
pub mod client;
pub mod config;
pub mod ddl;
pub mod naming;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testutils;
