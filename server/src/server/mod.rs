mod cli;
mod config;
mod entry;
mod transport;

pub use entry::run;
