pub mod calendar_cache;
pub mod db_utils;
