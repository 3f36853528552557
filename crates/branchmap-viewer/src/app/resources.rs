use bevy::prelude::Resource;
use bevy_egui::egui;
use branchmap_core::{GenerateReply, GenerationTicket, MapSession, MapSnapshot, Msg, NodeHandle};
use crossbeam_channel::Receiver;
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;

use crate::net::Incoming;
use crate::render::preview::Preview;
use crate::util::config::{self, ViewerConfig};

#[derive(Resource)]
pub struct NetRx(pub Receiver<Incoming>);

#[derive(Resource)]
pub struct NetTx(pub UnboundedSender<Msg>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    Connecting,
    Connected { backend: Option<String> },
    Disconnected,
}

#[derive(Debug, Default)]
pub struct StartForm {
    pub prompt: String,
    pub attachment_path: String,
    pub error: Option<String>,
}

/// Per-node widget state that is not part of the map itself.
#[derive(Debug, Default)]
pub struct NodeUi {
    pub reprompt: Option<String>,
    pub quick: String,
}

#[derive(Debug, Default)]
pub struct PopupUi {
    /// Screen position the popup hangs from (below the selection).
    pub anchor: Option<egui::Pos2>,
    pub attachment_path: String,
    pub error: Option<String>,
    /// Set when the popup opens so its input grabs keyboard focus once.
    pub focus_input: bool,
}

#[derive(Resource)]
pub struct MapState {
    pub session: MapSession,
    pub cfg: ViewerConfig,
    pub snapshot: MapSnapshot,
    pub link: LinkStatus,
    pub agent_models: Vec<String>,
    pub start: StartForm,
    pub nodes: HashMap<NodeHandle, NodeUi>,
    pub previews: HashMap<NodeHandle, Preview>,
    pub popup: PopupUi,
    /// Last selection forwarded to the session, to avoid re-opening the
    /// popup for a selection that is still highlighted.
    pub last_selection: Option<(NodeHandle, String)>,
    pub confirm_remove: Option<NodeHandle>,
    pub status: Option<String>,
    /// Screen rect of the canvas panel as of the last frame.
    pub canvas_rect: egui::Rect,
}

impl MapState {
    pub fn new(cfg: ViewerConfig) -> Self {
        let session = MapSession::new(cfg.map_config());
        let snapshot = session.snapshot();
        Self {
            session,
            cfg,
            snapshot,
            link: LinkStatus::Connecting,
            agent_models: Vec::new(),
            start: StartForm::default(),
            nodes: HashMap::new(),
            previews: HashMap::new(),
            popup: PopupUi::default(),
            last_selection: None,
            confirm_remove: None,
            status: None,
            canvas_rect: egui::Rect::ZERO,
        }
    }

    /// Rebuilds the cached snapshot if anything changed since last frame.
    pub fn refresh(&mut self) {
        if self.session.take_redraw() {
            self.snapshot = self.session.snapshot();
            let live = &self.session;
            self.nodes.retain(|h, _| live.node(*h).is_some());
            self.previews.retain(|h, _| live.node(*h).is_some());
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.link, LinkStatus::Connected { .. })
    }

    /// Sends a ticket to the agent, failing the node inline if that is not
    /// possible.
    pub fn dispatch(&mut self, net: &NetTx, ticket: GenerationTicket) {
        let GenerationTicket { request_id, node, request } = ticket;
        if !self.is_connected() {
            self.session
                .complete(request_id, GenerateReply::Error("agent is not connected".to_string()));
            return;
        }
        if net.0.send(Msg::Generate { request_id, request }).is_err() {
            bevy::log::warn!(%node, "network thread is gone");
            self.session
                .complete(request_id, GenerateReply::Error("network thread stopped".to_string()));
        }
    }

    /// Connection to the agent dropped. Fails in-flight requests on the
    /// first report only; the client repeats the report on every retry.
    pub fn link_lost(&mut self) -> usize {
        let was_connected = self.is_connected();
        self.link = LinkStatus::Disconnected;
        if !was_connected {
            return 0;
        }
        bevy::log::warn!("agent disconnected");
        self.session.fail_all_pending("agent disconnected")
    }

    /// Models offered in the selector: the agent's list, then configured
    /// extras, then the current choice.
    pub fn model_choices(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for m in self.agent_models.iter().chain(&self.cfg.models).chain([&self.cfg.model]) {
            if !out.contains(m) {
                out.push(m.clone());
            }
        }
        out
    }

    pub fn select_model(&mut self, model: String) {
        if model == self.cfg.model {
            return;
        }
        self.session.set_model(model.clone());
        self.cfg.model = model;
        if let Err(e) = config::save(&self.cfg) {
            bevy::log::warn!("failed to save viewer config: {e:#}");
            self.status = Some(format!("could not save preferences: {e}"));
        }
    }
}
