pub mod batch;
pub mod demo;
pub mod error;
pub mod settings;
pub mod view;
