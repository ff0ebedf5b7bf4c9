pub mod describe;
pub mod engine;
pub mod enumerate;
pub mod map;
pub mod types;
pub mod value;
