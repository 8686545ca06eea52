pub mod protocol;
pub mod replica;
pub mod runtime;
pub mod session;

#[cfg(feature = "lobby")]
pub mod game_session;
