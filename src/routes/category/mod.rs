mod handler;

pub use handler::{create_category, delete_category, get_category, list_categories};
