use bevy::log::warn;
use bevy::prelude::{Res, ResMut};
use bevy_egui::{egui, EguiContexts};

use crate::app::resources::{MapState, NetTx, PopupUi};
use crate::ui::load_attachment;

const EXCERPT_PREVIEW_CHARS: usize = 80;

/// Floating input that turns a highlighted excerpt into a new branch.
pub fn branch_popup(mut contexts: EguiContexts, mut st: ResMut<MapState>, net: Res<NetTx>) {
    let st = &mut *st;
    let Some(draft) = st.session.popup().cloned() else {
        return;
    };
    let ctx = contexts.ctx_mut();
    let anchor = st.popup.anchor.unwrap_or_else(|| st.canvas_rect.center());
    let mut prompt = draft.prompt.clone();
    let mut submit = false;
    let mut cancel = false;

    egui::Area::new("branch-popup".into())
        .order(egui::Order::Foreground)
        .fixed_pos(anchor + egui::vec2(0.0, 6.0))
        .constrain(true)
        .show(ctx, |ui| {
            egui::Frame::popup(ui.style()).show(ui, |ui| {
                ui.set_max_width(320.0);
                ui.label(egui::RichText::new(format!("\"{}\"", preview(&draft.excerpt))).italics().weak());
                let input = ui.add(
                    egui::TextEdit::singleline(&mut prompt)
                        .hint_text("Ask about this (optional)")
                        .desired_width(f32::INFINITY),
                );
                if std::mem::take(&mut st.popup.focus_input) {
                    input.request_focus();
                }
                submit = input.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                ui.horizontal(|ui| {
                    ui.label("Attachment:");
                    ui.add(egui::TextEdit::singleline(&mut st.popup.attachment_path).hint_text("optional file path"));
                });
                if let Some(err) = &st.popup.error {
                    let color = ui.visuals().error_fg_color;
                    ui.colored_label(color, err);
                }
                ui.horizontal(|ui| {
                    submit |= ui.button("Send").clicked();
                    cancel = ui.button("Cancel").clicked();
                });
            });
        });

    if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
        cancel = true;
    }
    if prompt != draft.prompt {
        st.session.set_popup_prompt(&prompt);
    }
    if cancel {
        st.session.dismiss_popup();
        st.popup = PopupUi::default();
        return;
    }
    if !submit {
        return;
    }

    match load_attachment(&st.popup.attachment_path) {
        Ok(a) => st.session.set_popup_attachment(a),
        Err(e) => {
            st.popup.error = Some(e.to_string());
            return;
        }
    }
    match st.session.submit_popup() {
        Ok(Some(ticket)) => {
            st.popup = PopupUi::default();
            st.last_selection = None;
            st.dispatch(&net, ticket);
        }
        Ok(None) => {}
        Err(e) => {
            warn!("branch creation failed: {e}");
            st.status = Some(e.to_string());
        }
    }
}

fn preview(excerpt: &str) -> String {
    if excerpt.chars().count() <= EXCERPT_PREVIEW_CHARS {
        return excerpt.to_string();
    }
    let head: String = excerpt.chars().take(EXCERPT_PREVIEW_CHARS).collect();
    format!("{}...", head.trim_end())
}

#[cfg(test)]
mod tests {
    use super::preview;

    #[test]
    fn long_excerpts_are_shortened() {
        assert_eq!(preview("short"), "short");
        let long = "word ".repeat(40);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert!(p.chars().count() <= super::EXCERPT_PREVIEW_CHARS + 3);
    }
}
