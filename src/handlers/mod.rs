pub mod session;
pub mod studio;
