pub mod loop_settings;
pub mod tunables;
