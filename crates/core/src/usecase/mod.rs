pub mod app_service;
pub mod batch_client;
pub mod poller;
