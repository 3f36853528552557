pub mod canvas;
pub mod preview;

use bevy::prelude::*;

pub use canvas::draw_canvas;

/// The map itself is drawn by egui; bevy only needs a camera to present it.
pub fn setup_scene(mut commands: Commands) {
    commands.spawn(Camera2dBundle::default());
}
