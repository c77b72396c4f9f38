pub mod registration;
pub mod session;

pub use registration::register;
pub use session::{introspect, login, logout, logout_all, refresh};
