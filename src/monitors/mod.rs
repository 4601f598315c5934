pub mod stat_monitor;
