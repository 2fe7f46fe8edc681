pub mod guard;
pub mod model;
pub mod overall;
pub mod store;
