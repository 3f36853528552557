use bevy::log::{info, warn};
use bevy::prelude::ResMut;
use bevy_egui::{egui, EguiContexts};

use crate::app::resources::MapState;

pub fn confirm_remove(mut contexts: EguiContexts, mut st: ResMut<MapState>) {
    let st = &mut *st;
    let Some(h) = st.confirm_remove else {
        return;
    };
    let Some(node) = st.session.node(h) else {
        st.confirm_remove = None;
        return;
    };
    let label = node.label.clone();
    let below = st.session.store().subtree(h).count().saturating_sub(1);
    let mut confirmed = false;
    let mut cancelled = false;

    egui::Window::new("Remove branch")
        .collapsible(false)
        .resizable(false)
        .order(egui::Order::Foreground)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(contexts.ctx_mut(), |ui| {
            ui.label(format!("Remove node {label}?"));
            if below > 0 {
                ui.label(format!("This also removes {below} node(s) branching from it."));
            }
            ui.horizontal(|ui| {
                confirmed = ui.button("Remove").clicked();
                cancelled = ui.button("Cancel").clicked();
            });
        });

    if confirmed {
        st.confirm_remove = None;
        match st.session.remove(h) {
            Ok(n) => info!(node = %h, removed = n, "branch removed"),
            Err(e) => {
                warn!("remove failed: {e}");
                st.status = Some(e.to_string());
            }
        }
    } else if cancelled {
        st.confirm_remove = None;
    }
}
