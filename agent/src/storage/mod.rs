pub mod credentials;
pub mod layout;
pub mod settings;
