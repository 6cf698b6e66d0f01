pub mod io;
pub mod points;
