use bevy::log::warn;
use bevy::prelude::{Res, ResMut};
use bevy_egui::{egui, EguiContexts};
use branchmap_core::{
    Attachment, AttachmentKind, BranchFlow, BranchPhase, FormattedText, HitRegion, MapError, NodeHandle, NodeView, Point,
    Response, SelectionRegion, Size,
};
use egui::emath::TSTransform;

use crate::app::resources::{MapState, NetTx, NodeUi};
use crate::render::preview::{self, Preview};

const CANVAS_BG: egui::Color32 = egui::Color32::from_rgb(236, 239, 243);
const CONNECTOR_COLOR: egui::Color32 = egui::Color32::from_rgb(140, 150, 168);
const FOCUS_OUTLINE: egui::Color32 = egui::Color32::from_rgb(66, 133, 244);

enum NodeAction {
    ToggleCollapse(NodeHandle),
    Focus(NodeHandle),
    AskRemove(NodeHandle),
    Reprompt(NodeHandle, String),
    Undo(NodeHandle),
    FollowUp(NodeHandle, String),
}

/// Text currently highlighted inside one node.
struct Highlight {
    node: NodeHandle,
    region: SelectionRegion,
    text: String,
    /// Screen position just below the end of the selection.
    anchor: egui::Pos2,
}

pub fn draw_canvas(mut contexts: EguiContexts, mut st: ResMut<MapState>, net: Res<NetTx>) {
    if !st.session.is_started() {
        return;
    }
    let st = &mut *st;
    let ctx = contexts.ctx_mut();

    let panel = egui::CentralPanel::default()
        .frame(egui::Frame::none().fill(CANVAS_BG))
        .show(ctx, |ui| {
            let rect = ui.max_rect();
            (rect, ui.allocate_rect(rect, egui::Sense::click_and_drag()))
        });
    let (rect, bg) = panel.inner;
    st.canvas_rect = rect;
    st.session.set_screen_size(rect.width(), rect.height());
    canvas_pointer(ctx, st, &bg, rect.min);
    if st.session.viewport().is_panning() {
        ctx.set_cursor_icon(egui::CursorIcon::Grabbing);
    } else if bg.hovered() {
        ctx.set_cursor_icon(egui::CursorIcon::Grab);
    }

    for view in &st.snapshot.nodes {
        let Some(a) = &view.attachment else { continue };
        if a.kind() == AttachmentKind::ImagePreview && !st.previews.contains_key(&view.handle) {
            st.previews.insert(view.handle, preview::load(ctx, view.handle, a));
        }
    }

    let t = st.session.viewport().transform();
    let layer_tf = TSTransform::new(rect.min.to_vec2() + egui::vec2(t.translate.x, t.translate.y), t.scale);

    let painter = ctx.layer_painter(egui::LayerId::background()).with_clip_rect(rect);
    let stroke = egui::Stroke::new(1.5 * t.scale, CONNECTOR_COLOR);
    for c in &st.snapshot.connectors {
        let pts: Vec<egui::Pos2> = c.points.iter().map(|p| layer_tf * egui::pos2(p.x, p.y)).collect();
        painter.add(egui::Shape::line(pts, stroke));
    }

    let width = st.session.config().layout.node_width as f32;
    let clip = layer_tf.inverse() * rect;
    let mut actions = Vec::new();
    let mut sizes = Vec::new();
    let mut highlight = None;
    for view in &st.snapshot.nodes {
        let id = egui::Id::new(("map-node", view.handle.0));
        ctx.set_transform_layer(egui::LayerId::new(egui::Order::Middle, id), layer_tf);
        let node_ui = st.nodes.entry(view.handle).or_default();
        let image = st.previews.get(&view.handle);
        let area = egui::Area::new(id)
            .order(egui::Order::Middle)
            .fixed_pos(egui::pos2(view.position.left as f32, view.position.top as f32))
            .constrain(false)
            .show(ctx, |ui| {
                ui.set_clip_rect(clip);
                node_card(ui, view, width, node_ui, image, layer_tf, &mut actions)
            });
        if let Some(h) = area.inner {
            highlight = Some(h);
        }
        let measured = area.response.rect.size();
        sizes.push((view.handle, Size::from_measured(measured.x, measured.y)));
    }

    for (h, size) in sizes {
        st.session.report_size(h, size);
    }
    track_selection(ctx, st, highlight);
    for action in actions {
        apply(st, &net, action);
    }
}

/// Drags on bare canvas pan; a plain click closes the popup.
fn canvas_pointer(ctx: &egui::Context, st: &mut MapState, bg: &egui::Response, origin: egui::Pos2) {
    let local = |p: egui::Pos2| Point::new(p.x - origin.x, p.y - origin.y);
    if bg.drag_started() {
        if let Some(p) = ctx.input(|i| i.pointer.press_origin()) {
            st.session.press(local(p), HitRegion::Canvas);
        }
    }
    if bg.dragged() {
        if let Some(p) = bg.interact_pointer_pos() {
            st.session.drag_to(local(p));
        }
    }
    if bg.drag_stopped() {
        st.session.release();
    }
    if bg.clicked() {
        if let Some(p) = bg.interact_pointer_pos() {
            st.session.press(local(p), HitRegion::Canvas);
            st.session.release();
        }
    }
}

fn track_selection(ctx: &egui::Context, st: &mut MapState, highlight: Option<Highlight>) {
    match highlight {
        Some(h) => {
            let key = (h.node, h.text);
            if st.last_selection.as_ref() != Some(&key) {
                st.session.selection_changed(key.0, h.region, &key.1);
                st.popup.anchor = Some(h.anchor);
                st.last_selection = Some(key);
            }
        }
        None => {
            // Losing the highlight only matters before the popup is up;
            // focusing the popup's own input clears it too.
            if let Some((node, _)) = st.last_selection.take() {
                if matches!(st.session.flow(), BranchFlow::Selecting { .. }) {
                    st.session.selection_changed(node, SelectionRegion::Outside, "");
                }
            }
        }
    }
    if matches!(st.session.flow(), BranchFlow::Selecting { .. })
        && ctx.input(|i| i.pointer.any_released())
        && st.session.selection_released()
    {
        st.popup.attachment_path.clear();
        st.popup.error = None;
        st.popup.focus_input = true;
    }
}

fn apply(st: &mut MapState, net: &NetTx, action: NodeAction) {
    let result = match action {
        NodeAction::ToggleCollapse(h) => st.session.toggle_collapse(h).map(|_| ()),
        NodeAction::Focus(h) => st.session.focus(h),
        NodeAction::AskRemove(h) => {
            st.confirm_remove = Some(h);
            Ok(())
        }
        NodeAction::Undo(h) => st.session.undo(h),
        NodeAction::Reprompt(h, text) => st.session.reprompt(h, &text).map(|ticket| {
            st.nodes.entry(h).or_default().reprompt = None;
            st.dispatch(net, ticket);
        }),
        NodeAction::FollowUp(h, text) => st.session.quick_follow_up(h, &text).map(|ticket| {
            if let Some(ticket) = ticket {
                st.dispatch(net, ticket);
            }
        }),
    };
    if let Err(e) = result {
        report(st, e);
    }
}

fn report(st: &mut MapState, e: MapError) {
    warn!("map action failed: {e}");
    st.status = Some(e.to_string());
}

fn node_card(
    ui: &mut egui::Ui,
    view: &NodeView,
    width: f32,
    node_ui: &mut NodeUi,
    image: Option<&Preview>,
    layer_tf: TSTransform,
    actions: &mut Vec<NodeAction>,
) -> Option<Highlight> {
    let mut frame = egui::Frame::window(ui.style());
    if view.is_view_root && !view.is_root {
        frame = frame.stroke(egui::Stroke::new(2.0, FOCUS_OUTLINE));
    }
    frame
        .show(ui, |ui| {
            ui.set_width(width);
            node_header(ui, view, actions);
            ui.separator();

            ui.label(egui::RichText::new(view.prompt_title).small().strong());
            let prompt = FormattedText { lines: vec![vec![branchmap_core::Span {
                text: view.prompt_text.clone(),
                strong: false,
            }]] };
            let mut highlight = selectable_text(ui, ("prompt", view.handle.0), &prompt, layer_tf)
                .map(|(text, anchor)| Highlight { node: view.handle, region: SelectionRegion::Prompt, text, anchor });
            if let Some(a) = &view.attachment {
                match image {
                    Some(Preview::Ready(tex)) => {
                        let size = preview::fit(tex.size_vec2(), width);
                        ui.add(egui::Image::new((tex.id(), size)))
                            .on_hover_text(a.name.as_str());
                    }
                    _ => attachment_chip(ui, a),
                }
            }

            ui.add_space(6.0);
            ui.label(egui::RichText::new("Gemini:").small().strong());
            match &view.response {
                Response::Ready(_) => {
                    if let Some((text, anchor)) =
                        selectable_text(ui, ("response", view.handle.0), &view.body, layer_tf)
                    {
                        highlight =
                            Some(Highlight { node: view.handle, region: SelectionRegion::Response, text, anchor });
                    }
                }
                failed @ Response::Failed(_) => {
                    let color = ui.visuals().error_fg_color;
                    ui.colored_label(color, failed.display_text());
                }
                placeholder => {
                    ui.label(egui::RichText::new(placeholder.display_text()).italics().weak());
                }
            }

            ui.add_space(6.0);
            node_footer(ui, view, node_ui, actions);
            highlight
        })
        .inner
}

fn node_header(ui: &mut egui::Ui, view: &NodeView, actions: &mut Vec<NodeAction>) {
    ui.horizontal(|ui| {
        let title = if view.is_root { "Root".to_string() } else { format!("Node {}", view.label) };
        ui.strong(title);
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if !view.is_root && ui.small_button("×").on_hover_text("Remove branch").clicked() {
                actions.push(NodeAction::AskRemove(view.handle));
            }
            if !view.is_view_root && ui.small_button("◉").on_hover_text("Focus on this node").clicked() {
                actions.push(NodeAction::Focus(view.handle));
            }
            if view.has_children {
                let (icon, hint) = if view.collapsed { ("+", "Expand") } else { ("−", "Collapse") };
                if ui.small_button(icon).on_hover_text(hint).clicked() {
                    actions.push(NodeAction::ToggleCollapse(view.handle));
                }
            }
        });
    });
}

fn node_footer(ui: &mut egui::Ui, view: &NodeView, node_ui: &mut NodeUi, actions: &mut Vec<NodeAction>) {
    if let Some(draft) = node_ui.reprompt.as_mut() {
        ui.add(egui::TextEdit::multiline(draft).desired_rows(2).desired_width(f32::INFINITY));
        let mut cancel = false;
        ui.horizontal(|ui| {
            if ui.button("Generate").clicked() {
                actions.push(NodeAction::Reprompt(view.handle, draft.clone()));
            }
            cancel = ui.button("Cancel").clicked();
        });
        if cancel {
            node_ui.reprompt = None;
        }
        return;
    }

    if matches!(view.response, Response::Ready(_)) {
        ui.horizontal(|ui| {
            let w = width_left(ui, 60.0);
            let input = ui.add(
                egui::TextEdit::singleline(&mut node_ui.quick)
                    .hint_text("Ask a follow-up...")
                    .desired_width(w),
            );
            let entered = input.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if ui.button("Send").clicked() || entered {
                actions.push(NodeAction::FollowUp(view.handle, std::mem::take(&mut node_ui.quick)));
            }
        });
    }

    ui.horizontal(|ui| {
        let busy = view.phase == BranchPhase::AwaitingResponse;
        if ui.add_enabled(!busy, egui::Button::new("Re-prompt")).clicked() {
            node_ui.reprompt = Some(view.prompt_text.clone());
        }
        if view.can_undo && ui.button("Undo").clicked() {
            actions.push(NodeAction::Undo(view.handle));
        }
    });
}

fn width_left(ui: &egui::Ui, reserve: f32) -> f32 {
    (ui.available_width() - reserve).max(40.0)
}

fn attachment_chip(ui: &mut egui::Ui, attachment: &Attachment) {
    let text = match attachment.kind() {
        AttachmentKind::ImagePreview => format!("🖼 {}", attachment.name),
        AttachmentKind::Badge => format!("📎 {}", attachment.name),
    };
    egui::Frame::group(ui.style()).show(ui, |ui| {
        ui.label(egui::RichText::new(text).small());
    });
}

/// Read-only, selectable rendering of formatted text. Returns the selected
/// excerpt and its screen anchor while this text holds keyboard focus.
fn selectable_text(
    ui: &mut egui::Ui,
    salt: (&str, u32),
    body: &FormattedText,
    layer_tf: TSTransform,
) -> Option<(String, egui::Pos2)> {
    let text = body.plain();
    let font = egui::TextStyle::Body.resolve(ui.style());
    let normal = ui.visuals().text_color();
    let strong = ui.visuals().strong_text_color();
    let mut layouter = |ui: &egui::Ui, _: &str, wrap_width: f32| {
        let mut job = layout_job(body, &font, normal, strong);
        job.wrap.max_width = wrap_width;
        ui.fonts(|f| f.layout_job(job))
    };
    let mut buffer: &str = text.as_str();
    let output = egui::TextEdit::multiline(&mut buffer)
        .id(ui.id().with(salt))
        .frame(false)
        .desired_rows(1)
        .desired_width(f32::INFINITY)
        .layouter(&mut layouter)
        .show(ui);
    if !output.response.has_focus() {
        return None;
    }
    let range = output.cursor_range?;
    let (a, b) = (range.primary.ccursor.index, range.secondary.ccursor.index);
    let (start, end) = (a.min(b), a.max(b));
    if start == end {
        return None;
    }
    let excerpt: String = text.chars().skip(start).take(end - start).collect();
    let caret = output
        .galley
        .pos_from_cursor(&output.galley.from_ccursor(egui::text::CCursor::new(end)))
        .translate(output.galley_pos.to_vec2());
    Some((excerpt, layer_tf * caret.left_bottom()))
}

fn layout_job(
    body: &FormattedText,
    font: &egui::FontId,
    normal: egui::Color32,
    strong: egui::Color32,
) -> egui::text::LayoutJob {
    let mut job = egui::text::LayoutJob::default();
    for (i, line) in body.lines.iter().enumerate() {
        if i > 0 {
            job.append("\n", 0.0, egui::TextFormat::simple(font.clone(), normal));
        }
        for span in line {
            let color = if span.strong { strong } else { normal };
            job.append(&span.text, 0.0, egui::TextFormat::simple(font.clone(), color));
        }
    }
    job
}
