pub mod app_user;
pub mod contractor;
