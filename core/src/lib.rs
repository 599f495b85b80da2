pub mod alarm;
pub mod alarm_store;
pub mod clock;
pub mod db;
mod json_file;
pub mod models;
pub mod nutrition;
pub mod profile;
pub mod sleep;
pub mod sleep_store;
pub mod source;
pub mod spoonacular;
pub mod store;
