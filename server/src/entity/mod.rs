pub mod admin_settings;
pub mod charts;
pub mod uploads;
pub mod usage_logs;
pub mod users;
