pub mod image_file_device;
pub mod synthetic_device;
