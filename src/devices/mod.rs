pub mod dht22;
pub mod ina260;

pub use dht22::Dht22;
pub use ina260::Ina260;
