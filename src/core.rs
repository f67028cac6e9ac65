pub mod buffer;
pub mod camera;
pub mod display;
pub mod event_processing;
pub mod events;
pub mod gameloop;
pub mod gpu;
pub mod render_target;
pub mod rendering;
pub mod shader;
