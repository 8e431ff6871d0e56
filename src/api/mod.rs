pub mod attendance;
pub mod employee;
pub mod overtime;
pub mod time_off;
