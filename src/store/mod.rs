pub mod kv;
pub mod local;
pub mod lock;
pub mod paths;
