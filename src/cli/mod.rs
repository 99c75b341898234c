pub mod dispatcher;
pub mod main_types;
