pub mod routing;
pub mod target;
