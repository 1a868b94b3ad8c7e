mod client;

pub use client::UzumApiClient;
