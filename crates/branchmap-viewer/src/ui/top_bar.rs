use bevy::prelude::ResMut;
use bevy_egui::{egui, EguiContexts};

use crate::app::resources::{LinkStatus, MapState};

/// Breadcrumb trail of drilled-into nodes, model selector and link state.
pub fn breadcrumb_bar(mut contexts: EguiContexts, mut st: ResMut<MapState>) {
    let st = &mut *st;
    let mut navigate = None;
    let mut model = None;
    let mut clear_status = false;

    egui::TopBottomPanel::top("breadcrumbs").show(contexts.ctx_mut(), |ui| {
        ui.horizontal(|ui| {
            ui.heading("Branch Map");
            ui.separator();
            for (i, crumb) in st.snapshot.breadcrumbs.iter().enumerate() {
                if i > 0 {
                    ui.label(">");
                }
                let button = egui::Button::new(crumb.label.as_str()).frame(crumb.interactive);
                if ui.add_enabled(crumb.interactive, button).clicked() {
                    navigate = Some(crumb.node);
                }
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let (dot, text) = match &st.link {
                    LinkStatus::Connecting => (egui::Color32::GRAY, "connecting".to_string()),
                    LinkStatus::Connected { backend: Some(b) } => (egui::Color32::GREEN, format!("agent: {b}")),
                    LinkStatus::Connected { backend: None } => (egui::Color32::GREEN, "agent".to_string()),
                    LinkStatus::Disconnected => (egui::Color32::RED, "agent offline".to_string()),
                };
                ui.label(text);
                ui.colored_label(dot, "●");
                ui.separator();

                egui::ComboBox::from_id_source("model")
                    .selected_text(st.cfg.model.as_str())
                    .show_ui(ui, |ui| {
                        for m in st.model_choices() {
                            if ui.selectable_label(m == st.cfg.model, m.as_str()).clicked() {
                                model = Some(m);
                            }
                        }
                    });
                ui.label("Model:");

                let pending = st.session.pending_count();
                if pending > 0 {
                    ui.separator();
                    ui.label(format!("{pending} pending"));
                    ui.spinner();
                }
            });
        });

        if let Some(status) = &st.status {
            ui.horizontal(|ui| {
                let color = ui.visuals().warn_fg_color;
                ui.colored_label(color, status);
                clear_status = ui.small_button("dismiss").clicked();
            });
        }
    });

    if let Some(node) = navigate {
        st.session.navigate_to(node);
    }
    if let Some(m) = model {
        st.select_model(m);
    }
    if clear_status {
        st.status = None;
    }
}
