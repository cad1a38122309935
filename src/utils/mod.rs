pub mod time;

pub use time::{date_window, parse_date_bound, DateBound};
