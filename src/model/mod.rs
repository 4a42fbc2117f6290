pub mod admission;
pub mod api;
pub mod ballot;
pub mod common;
pub mod db;
pub mod mongodb;
pub mod recorder;
pub mod results;
pub mod stats;
