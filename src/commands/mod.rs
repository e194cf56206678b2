pub mod serve;
pub mod validate;

pub use serve::handle_serve;
pub use validate::handle_validate;
