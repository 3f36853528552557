use bevy::input::mouse::{MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts};
use branchmap_core::Point;

use crate::app::resources::{LinkStatus, MapState, NetRx, NetTx};
use crate::net::{self, IncomingKind};
use crate::util::config;

pub mod resources;

/// Pixels per wheel "line", roughly what browsers use.
const LINE_HEIGHT_PX: f32 = 40.0;

pub struct BranchMapViewerPlugin;

impl Plugin for BranchMapViewerPlugin {
    fn build(&self, app: &mut App) {
        let cfg = config::load_or_default();
        let (in_tx, in_rx) = crossbeam_channel::unbounded();
        let (out_tx, out_rx) = tokio::sync::mpsc::unbounded_channel();
        net::spawn_client(cfg.socket.clone(), in_tx, out_rx);

        app.insert_resource(MapState::new(cfg))
            .insert_resource(NetRx(in_rx))
            .insert_resource(NetTx(out_tx))
            .add_systems(Startup, crate::render::setup_scene)
            .add_systems(
                Update,
                (
                    pump_network,
                    tick_session,
                    wheel_input,
                    crate::ui::breadcrumb_bar,
                    crate::render::draw_canvas,
                    crate::ui::start_screen,
                    crate::ui::branch_popup,
                    crate::ui::confirm_remove,
                )
                    .chain(),
            );
    }
}

fn pump_network(mut st: ResMut<MapState>, rx: Res<NetRx>) {
    for inc in rx.0.try_iter().take(10_000) {
        match inc.kind {
            IncomingKind::Connected => {
                info!(stream = %inc.stream, "agent connected");
                st.link = LinkStatus::Connected { backend: None };
                st.status = None;
            }
            IncomingKind::Identity { backend, models } => {
                info!(%backend, ?models, "agent identity");
                st.link = LinkStatus::Connected { backend: Some(backend) };
                st.agent_models = models;
            }
            IncomingKind::Generated { request_id, reply } => {
                st.session.complete(request_id, reply);
            }
            IncomingKind::Disconnected => {
                st.link_lost();
            }
            IncomingKind::Error(e) => {
                debug!(stream = %inc.stream, error = %e, "network error");
                // Refused connects repeat every retry; the link badge covers them.
                if st.is_connected() {
                    st.status = Some(e);
                }
            }
            IncomingKind::Other(_) => {}
        }
    }
}

fn tick_session(time: Res<Time>, mut st: ResMut<MapState>) {
    st.session.tick(time.delta());
    st.refresh();
}

/// Wheel scrolls the canvas; with Ctrl held it zooms around the cursor.
fn wheel_input(
    mut wheel: EventReader<MouseWheel>,
    keys: Res<ButtonInput<KeyCode>>,
    mut contexts: EguiContexts,
    mut st: ResMut<MapState>,
) {
    let ctx = contexts.ctx_mut();
    let Some(pointer) = ctx.input(|i| i.pointer.hover_pos()) else {
        wheel.clear();
        return;
    };
    let over_window = ctx
        .layer_id_at(pointer)
        .is_some_and(|layer| layer.order == egui::Order::Foreground);
    if over_window || !st.session.is_started() || !st.canvas_rect.contains(pointer) {
        wheel.clear();
        return;
    }
    let zoom = keys.any_pressed([KeyCode::ControlLeft, KeyCode::ControlRight]);
    let origin = st.canvas_rect.min;
    let cursor = Point::new(pointer.x - origin.x, pointer.y - origin.y);
    for ev in wheel.read() {
        let scale = match ev.unit {
            MouseScrollUnit::Line => LINE_HEIGHT_PX,
            MouseScrollUnit::Pixel => 1.0,
        };
        // Positive bevy y scrolls up; the session expects page-style deltas.
        let delta = Point::new(-ev.x * scale, -ev.y * scale);
        st.session.wheel(cursor, delta, zoom);
    }
}
