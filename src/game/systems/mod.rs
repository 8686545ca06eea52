pub mod match_phase;
pub mod movement;
pub mod consumption;
pub mod spawner;
