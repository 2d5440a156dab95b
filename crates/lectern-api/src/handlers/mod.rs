pub mod health;
pub mod maintenance;
pub mod namespace;
pub mod preview;
