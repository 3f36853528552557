use bevy::prelude::{Res, ResMut};
use bevy_egui::{egui, EguiContexts};

use crate::app::resources::{MapState, NetTx, StartForm};
use crate::ui::load_attachment;

pub fn start_screen(mut contexts: EguiContexts, mut st: ResMut<MapState>, net: Res<NetTx>) {
    if st.session.is_started() {
        return;
    }
    let st = &mut *st;
    let mut submit = false;

    egui::Window::new("Start a map")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(contexts.ctx_mut(), |ui| {
            ui.set_width(440.0);
            ui.label("What would you like to explore?");
            let input = ui.add(
                egui::TextEdit::multiline(&mut st.start.prompt)
                    .desired_rows(4)
                    .desired_width(f32::INFINITY)
                    .hint_text("Ask anything..."),
            );
            let ctrl_enter = input.has_focus() && ui.input(|i| i.modifiers.command && i.key_pressed(egui::Key::Enter));
            ui.horizontal(|ui| {
                ui.label("Attachment:");
                ui.add(egui::TextEdit::singleline(&mut st.start.attachment_path).hint_text("optional file path"));
            });
            if let Some(err) = &st.start.error {
                let color = ui.visuals().error_fg_color;
                ui.colored_label(color, err);
            }
            ui.add_space(6.0);
            let ready = !st.start.prompt.trim().is_empty();
            let clicked = ui.add_enabled(ready, egui::Button::new("Start Mapping")).clicked();
            submit = ready && (clicked || ctrl_enter);
        });

    if submit {
        start_map(st, &net);
    }
}

fn start_map(st: &mut MapState, net: &NetTx) {
    let attachment = match load_attachment(&st.start.attachment_path) {
        Ok(a) => a,
        Err(e) => {
            st.start.error = Some(e.to_string());
            return;
        }
    };
    match st.session.start(&st.start.prompt, attachment) {
        Ok(ticket) => {
            st.start = StartForm::default();
            st.dispatch(net, ticket);
        }
        Err(e) => st.start.error = Some(e.to_string()),
    }
}
