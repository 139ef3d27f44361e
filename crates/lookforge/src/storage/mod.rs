pub mod filesystem;

pub use filesystem::{mime_type_for, strip_data_url, FileStorage};
