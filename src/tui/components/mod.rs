pub mod data_table;
pub mod date_filter;
pub mod input_field;
pub mod status_display;

pub use data_table::DataTable;
pub use date_filter::DateFilterForm;
pub use input_field::InputField;
pub use status_display::{StatusDisplay, StatusType};
