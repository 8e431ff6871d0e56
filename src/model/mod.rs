pub mod attendance;
pub mod calendar;
pub mod company;
pub mod employee;
pub mod overtime;
pub mod role;
pub mod time_off;
