pub mod power;
pub mod system;
