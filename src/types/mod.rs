pub mod bounding_box;
pub mod data_kind;
pub mod feature;
pub mod field_path;
