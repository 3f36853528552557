//! Pan/zoom transform between canvas space and screen space, plus the
//! animated camera move used when a new node appears.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::geom::{Point, Position, Size};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub min_scale: f32,
    pub max_scale: f32,
    /// Screen x where `pan_to` places a node's left edge.
    pub pan_inset: f32,
    pub animation_ms: u64,
    /// Screen anchor of the absolute root after a reset.
    pub root_anchor: Point,
    /// Screen anchor of a focused view-root after a reset.
    pub focus_anchor: Point,
    /// Scale change per wheel unit when zooming.
    pub wheel_zoom_rate: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.2,
            max_scale: 3.0,
            pan_inset: 100.0,
            animation_ms: 500,
            root_anchor: Point::new(100.0, 150.0),
            focus_anchor: Point::new(50.0, 50.0),
            wheel_zoom_rate: 0.005,
        }
    }
}

/// Translate-then-scale mapping: `screen = translate + canvas * scale`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translate: Point,
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self { translate: Point::ZERO, scale: 1.0 }
    }
}

impl Transform {
    pub fn to_screen(&self, p: Point) -> Point {
        Point::new(self.translate.x + p.x * self.scale, self.translate.y + p.y * self.scale)
    }

    pub fn to_canvas(&self, p: Point) -> Point {
        Point::new((p.x - self.translate.x) / self.scale, (p.y - self.translate.y) / self.scale)
    }
}

/// What the pointer was over when a button went down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitRegion {
    Canvas,
    /// Response text, inputs, buttons, the popup. Never starts a pan.
    Interactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragOutcome {
    /// No pan was in progress.
    None,
    /// Button went down and up on the canvas without moving.
    Click,
    Pan,
}

pub fn ease_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

/// Offset animation driven by explicit `tick(dt)` calls.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraTween {
    from: Point,
    to: Point,
    elapsed: Duration,
    duration: Duration,
}

impl CameraTween {
    pub fn new(from: Point, to: Point, duration: Duration) -> Self {
        Self {
            from,
            to,
            elapsed: Duration::ZERO,
            duration: if duration.is_zero() { Duration::from_nanos(1) } else { duration },
        }
    }

    pub fn tick(&mut self, dt: Duration) {
        self.elapsed = self.elapsed.saturating_add(dt);
    }

    pub fn is_complete(&self) -> bool {
        self.elapsed >= self.duration
    }

    pub fn target(&self) -> Point {
        self.to
    }

    pub fn value(&self) -> Point {
        let t = self.elapsed.as_secs_f32() / self.duration.as_secs_f32();
        let e = ease_out_cubic(t);
        Point::new(
            self.from.x + (self.to.x - self.from.x) * e,
            self.from.y + (self.to.y - self.from.y) * e,
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    last: Point,
    moved: bool,
}

#[derive(Debug, Clone)]
pub struct Viewport {
    cfg: ViewportConfig,
    transform: Transform,
    screen: Point,
    drag: Option<Drag>,
    tween: Option<CameraTween>,
}

impl Viewport {
    pub fn new(cfg: ViewportConfig) -> Self {
        Self {
            cfg,
            transform: Transform::default(),
            screen: Point::new(1280.0, 720.0),
            drag: None,
            tween: None,
        }
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.cfg
    }

    pub fn set_screen_size(&mut self, width: f32, height: f32) {
        self.screen = Point::new(width, height);
    }

    pub fn is_animating(&self) -> bool {
        self.tween.is_some()
    }

    /// A canvas drag is in progress (button held since a canvas press).
    pub fn is_panning(&self) -> bool {
        self.drag.is_some()
    }

    /// Cursor-anchored zoom by a relative factor. Returns whether the
    /// transform changed.
    pub fn zoom(&mut self, cursor: Point, factor: f32) -> bool {
        if !factor.is_finite() {
            return false;
        }
        self.zoom_to(cursor, self.transform.scale * factor)
    }

    /// Cursor-anchored zoom to `target`, clamped to the configured scale
    /// range: the canvas point under `cursor` stays under it.
    pub fn zoom_to(&mut self, cursor: Point, target: f32) -> bool {
        if target.is_nan() {
            return false;
        }
        let old = self.transform.scale;
        let new = target.clamp(self.cfg.min_scale, self.cfg.max_scale);
        if new == old {
            return false;
        }
        self.tween = None;
        let ratio = new / old;
        let t = &mut self.transform;
        t.translate.x = cursor.x - (cursor.x - t.translate.x) * ratio;
        t.translate.y = cursor.y - (cursor.y - t.translate.y) * ratio;
        t.scale = new;
        true
    }

    pub fn pan(&mut self, dx: f32, dy: f32) -> bool {
        if dx == 0.0 && dy == 0.0 {
            return false;
        }
        self.tween = None;
        self.transform.translate.x += dx;
        self.transform.translate.y += dy;
        true
    }

    /// Wheel input: with the zoom modifier held the vertical delta zooms
    /// around the cursor, otherwise both deltas scroll the canvas.
    pub fn wheel(&mut self, cursor: Point, delta: Point, zoom_modifier: bool) -> bool {
        if zoom_modifier {
            // A large scroll can drive the factor below zero; that clamps to
            // the minimum scale rather than being ignored.
            let target = self.transform.scale * (1.0 - delta.y * self.cfg.wheel_zoom_rate);
            self.zoom_to(cursor, target)
        } else {
            self.pan(-delta.x, -delta.y)
        }
    }

    /// Pointer button down. Panning only starts over bare canvas.
    pub fn press(&mut self, pos: Point, region: HitRegion) -> bool {
        match region {
            HitRegion::Canvas => {
                self.drag = Some(Drag { last: pos, moved: false });
                true
            }
            HitRegion::Interactive => {
                self.drag = None;
                false
            }
        }
    }

    pub fn drag_to(&mut self, pos: Point) -> bool {
        let Some(drag) = self.drag.as_mut() else {
            return false;
        };
        let (dx, dy) = (pos.x - drag.last.x, pos.y - drag.last.y);
        drag.last = pos;
        if dx == 0.0 && dy == 0.0 {
            return false;
        }
        drag.moved = true;
        self.pan(dx, dy)
    }

    pub fn release(&mut self) -> DragOutcome {
        match self.drag.take() {
            None => DragOutcome::None,
            Some(Drag { moved: false, .. }) => DragOutcome::Click,
            Some(Drag { moved: true, .. }) => DragOutcome::Pan,
        }
    }

    /// Offset that puts a node's left edge at the pan inset and centres it
    /// vertically at the current scale.
    pub fn focus_offset(&self, pos: Position, size: Size) -> Point {
        let s = self.transform.scale;
        Point::new(
            self.cfg.pan_inset - pos.left as f32 * s,
            self.screen.y / 2.0 - size.height as f32 * s / 2.0 - pos.top as f32 * s,
        )
    }

    /// Starts an animated move towards a node, replacing any move in flight.
    /// The new move starts from wherever the camera currently is.
    pub fn pan_to(&mut self, pos: Position, size: Size) {
        let to = self.focus_offset(pos, size);
        let duration = Duration::from_millis(self.cfg.animation_ms);
        self.tween = Some(CameraTween::new(self.transform.translate, to, duration));
    }

    /// Advances the camera animation. Returns whether the transform moved.
    pub fn tick(&mut self, dt: Duration) -> bool {
        let Some(tween) = self.tween.as_mut() else {
            return false;
        };
        tween.tick(dt);
        self.transform.translate = tween.value();
        if tween.is_complete() {
            self.transform.translate = tween.target();
            self.tween = None;
        }
        true
    }

    /// Scale 1 with the view-root at its screen anchor. `None` resets to the
    /// identity transform.
    pub fn reset_to_anchor(&mut self, view_root: Option<(Position, bool)>) {
        self.tween = None;
        self.drag = None;
        self.transform.scale = 1.0;
        self.transform.translate = match view_root {
            None => Point::ZERO,
            Some((pos, is_root)) => {
                let anchor = if is_root { self.cfg.root_anchor } else { self.cfg.focus_anchor };
                Point::new(anchor.x - pos.left as f32, anchor.y - pos.top as f32)
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() <= 1e-3 * (1.0 + a.abs().max(b.abs()))
    }

    #[test]
    fn ease_out_cubic_endpoints() {
        assert_eq!(ease_out_cubic(0.0), 0.0);
        assert_eq!(ease_out_cubic(1.0), 1.0);
        assert_eq!(ease_out_cubic(2.0), 1.0);
        assert!(ease_out_cubic(0.5) > 0.5);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut vp = Viewport::new(ViewportConfig::default());
        vp.zoom(Point::ZERO, 100.0);
        assert_eq!(vp.transform().scale, 3.0);
        vp.zoom(Point::ZERO, 0.0001);
        assert_eq!(vp.transform().scale, 0.2);
        assert!(!vp.zoom(Point::ZERO, 0.5));
    }

    #[test]
    fn large_wheel_zoom_clamps_to_min_scale() {
        let mut vp = Viewport::new(ViewportConfig::default());
        let cursor = Point::new(200.0, 200.0);
        assert!(vp.wheel(cursor, Point::new(0.0, 250.0), true));
        assert_eq!(vp.transform().scale, 0.2);
        // Still anchored: the cursor maps back to the same canvas point.
        let p = vp.transform().to_canvas(cursor);
        assert!(close(p.x, 200.0) && close(p.y, 200.0), "{p:?}");

        assert!(vp.wheel(cursor, Point::new(0.0, -5000.0), true));
        assert_eq!(vp.transform().scale, 3.0);
        assert!(!vp.wheel(cursor, Point::new(0.0, -5000.0), true));
    }

    #[test]
    fn wheel_without_modifier_scrolls() {
        let mut vp = Viewport::new(ViewportConfig::default());
        vp.wheel(Point::ZERO, Point::new(3.0, 40.0), false);
        assert_eq!(vp.transform().translate, Point::new(-3.0, -40.0));
        assert_eq!(vp.transform().scale, 1.0);

        vp.wheel(Point::ZERO, Point::new(0.0, -100.0), true);
        assert!(close(vp.transform().scale, 1.5));
    }

    #[test]
    fn drag_pans_only_from_canvas() {
        let mut vp = Viewport::new(ViewportConfig::default());
        assert!(!vp.press(Point::new(10.0, 10.0), HitRegion::Interactive));
        assert!(!vp.drag_to(Point::new(50.0, 50.0)));
        assert!(!vp.is_panning());
        assert_eq!(vp.release(), DragOutcome::None);

        vp.press(Point::new(10.0, 10.0), HitRegion::Canvas);
        assert_eq!(vp.release(), DragOutcome::Click);

        vp.press(Point::new(10.0, 10.0), HitRegion::Canvas);
        vp.drag_to(Point::new(25.0, 5.0));
        assert!(vp.is_panning());
        assert_eq!(vp.transform().translate, Point::new(15.0, -5.0));
        assert_eq!(vp.release(), DragOutcome::Pan);
        assert!(!vp.is_panning());
    }

    #[test]
    fn pan_to_lands_on_target_after_duration() {
        let mut vp = Viewport::new(ViewportConfig::default());
        vp.set_screen_size(1000.0, 800.0);
        vp.pan_to(Position::new(600, 150), Size::new(400, 200));
        assert!(vp.is_animating());

        vp.tick(Duration::from_millis(250));
        let mid = vp.transform().translate;
        assert!(mid.x < 0.0 && mid.x > -500.0);

        vp.tick(Duration::from_millis(250));
        assert!(!vp.is_animating());
        assert_eq!(vp.transform().translate, Point::new(100.0 - 600.0, 400.0 - 100.0 - 150.0));
        assert!(!vp.tick(Duration::from_millis(16)));
    }

    #[test]
    fn newer_pan_request_wins() {
        let mut vp = Viewport::new(ViewportConfig::default());
        vp.set_screen_size(1000.0, 800.0);
        vp.pan_to(Position::new(600, 150), Size::new(400, 200));
        vp.tick(Duration::from_millis(100));
        let from = vp.transform().translate;

        vp.pan_to(Position::new(1100, 900), Size::new(400, 200));
        vp.tick(Duration::from_millis(1));
        let after = vp.transform().translate;
        assert!(after.distance(from) < 10.0);

        vp.tick(Duration::from_millis(600));
        assert_eq!(vp.transform().translate, Point::new(100.0 - 1100.0, 400.0 - 100.0 - 900.0));
    }

    #[test]
    fn manual_pan_cancels_animation() {
        let mut vp = Viewport::new(ViewportConfig::default());
        vp.pan_to(Position::new(600, 150), Size::new(400, 200));
        vp.pan(5.0, 0.0);
        assert!(!vp.is_animating());
    }

    #[test]
    fn reset_uses_root_or_focus_anchor() {
        let mut vp = Viewport::new(ViewportConfig::default());
        vp.zoom(Point::new(300.0, 300.0), 2.0);
        vp.reset_to_anchor(Some((Position::new(100, 150), true)));
        assert_eq!(vp.transform(), Transform::default());

        vp.reset_to_anchor(Some((Position::new(600, 400), false)));
        assert_eq!(vp.transform().translate, Point::new(50.0 - 600.0, 50.0 - 400.0));
        assert_eq!(vp.transform().scale, 1.0);
    }

    proptest! {
        #[test]
        fn zoom_keeps_canvas_point_under_cursor(
            cx in 0f32..1920.0,
            cy in 0f32..1080.0,
            tx in -2000f32..2000.0,
            ty in -2000f32..2000.0,
            f1 in 0.3f32..2.5,
            f2 in 0.3f32..2.5,
        ) {
            let mut vp = Viewport::new(ViewportConfig::default());
            vp.pan(tx, ty);
            vp.zoom(Point::new(400.0, 300.0), f1);

            let cursor = Point::new(cx, cy);
            let p = vp.transform().to_canvas(cursor);
            vp.zoom(cursor, f2);
            let back = vp.transform().to_screen(p);
            prop_assert!(close(back.x, cursor.x), "{back:?} vs {cursor:?}");
            prop_assert!(close(back.y, cursor.y), "{back:?} vs {cursor:?}");
        }
    }
}
