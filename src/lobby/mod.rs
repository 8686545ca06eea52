//! Session hosting: join codes, rooms and the peers attached to them

pub mod room;
pub mod manager;
pub mod player;
