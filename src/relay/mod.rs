pub mod broadcast_registry;
pub mod decimation_gate;
pub mod decoding_sink;
pub mod downstream_listener;
pub mod relay_config;
pub mod relay_driver;
