pub mod constants;
pub mod state;
pub mod trail;
pub mod spatial;
pub mod systems;
pub mod input_buffer;
pub mod ai_worker;
pub mod game_loop;
pub mod match_result;
pub mod performance;
pub mod render;
