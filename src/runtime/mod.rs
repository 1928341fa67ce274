pub mod builtins;
pub mod dict;
pub mod error;
pub mod hash;
pub mod interpreter;
pub mod scopes;
pub mod value;
