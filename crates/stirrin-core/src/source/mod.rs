pub mod filesystem;
pub mod interfaces;
pub mod mixin_config;
pub mod mixins;
pub mod parser;
pub mod resolver;
pub mod types;
