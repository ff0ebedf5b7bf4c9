pub mod mapper;
pub mod options;
pub mod render;
