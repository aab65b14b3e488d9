pub mod noise_pass;
pub mod pass;
pub mod scene_pass;
