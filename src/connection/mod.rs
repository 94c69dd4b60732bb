//! Public connection handle

mod rover;


pub use rover::RoverConnection;
