pub mod ballot;
pub mod results;
pub mod status;
