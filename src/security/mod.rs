pub mod access_control;
pub mod policy;

pub use access_control::*;
pub use policy::*;
