pub mod protocol;
pub mod questions;
pub mod ranking;
pub mod registry;
pub mod room;
pub mod scheduler;
pub mod server;

pub use protocol::ClientMessage;
pub use server::QuizServer;
