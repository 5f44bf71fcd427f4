pub mod affiliate;
pub mod config_management;

pub use affiliate::{inspect_url, link_url, tag_url};
