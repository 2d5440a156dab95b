//! Document identity resolution

mod resolver;

pub use resolver::DocumentResolver;
