//! Durable storage adapters for the intent queue.

mod json_file;

pub use json_file::JsonFileIntentStore;
