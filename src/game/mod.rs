pub mod constants;
pub mod state;
pub mod systems;
pub mod events;
pub mod game_loop;
pub mod match_result;
pub mod input_buffer;
