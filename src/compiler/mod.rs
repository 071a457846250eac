pub mod expander;
pub mod loader;
pub mod normalizer;
pub mod validator;
