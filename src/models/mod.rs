pub mod connection;
pub mod field_map;
pub mod schema;
pub mod settings;

pub use connection::*;
pub use field_map::*;
pub use schema::*;
pub use settings::*;
