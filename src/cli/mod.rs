pub mod cache;
pub mod convert;
pub mod providers;
pub mod setup;
pub mod show;
pub mod ui;
