pub mod camera_view;
pub mod capture;
pub mod scene;
pub mod shadow;
