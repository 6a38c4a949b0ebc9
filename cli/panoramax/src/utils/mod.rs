pub mod logger;
pub mod message;

pub use logger::init_logger;
