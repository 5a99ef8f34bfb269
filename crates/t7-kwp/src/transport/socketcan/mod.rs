//! Raw CAN frames over a Linux SocketCAN interface

mod adapter;

pub use adapter::SocketCanAdapter;
