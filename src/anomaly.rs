pub mod matcher;
pub mod overlap;
