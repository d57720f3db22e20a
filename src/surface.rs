//! Rectangle drawing as a two-state machine over display-space pointer events.

use egui::{Pos2, Vec2};

use crate::geometry::Rectangle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down(Pos2),
    Move(Pos2),
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DrawState {
    #[default]
    Idle,
    /// A gesture is in progress. `delta` is signed and not normalized.
    Drawing { anchor: Pos2, delta: Vec2 },
}

#[derive(Debug, Clone)]
pub struct DrawingSurface {
    state: DrawState,
    enabled: bool,
}

impl Default for DrawingSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawingSurface {
    pub fn new() -> Self {
        Self {
            state: DrawState::Idle,
            enabled: true,
        }
    }

    pub fn state(&self) -> DrawState {
        self.state
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.state, DrawState::Drawing { .. })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// While disabled, pointer-down does not start a gesture. A gesture
    /// already in progress is unaffected.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    // ── Transitions ─────────────────────────────────────────────────────

    /// Idle -> Drawing. Restarts the gesture if one is already running.
    pub fn pointer_down(&mut self, pos: Pos2) -> bool {
        if !self.enabled {
            return false;
        }
        self.state = DrawState::Drawing {
            anchor: pos,
            delta: Vec2::ZERO,
        };
        true
    }

    /// Drawing -> Drawing with the delta recomputed. No-op while idle.
    pub fn pointer_move(&mut self, pos: Pos2) {
        if let DrawState::Drawing { anchor, delta } = &mut self.state {
            *delta = pos - *anchor;
        }
    }

    /// Drawing -> Idle, emitting the normalized rectangle. Zero-size
    /// rectangles are emitted too. No-op while idle.
    pub fn pointer_up(&mut self) -> Option<Rectangle> {
        match std::mem::take(&mut self.state) {
            DrawState::Idle => None,
            DrawState::Drawing { anchor, delta } => Some(Rectangle::from_anchor_delta(anchor, delta)),
        }
    }

    pub fn abort(&mut self) {
        self.state = DrawState::Idle;
    }

    pub fn handle(&mut self, event: PointerEvent) -> Option<Rectangle> {
        match event {
            PointerEvent::Down(pos) => {
                self.pointer_down(pos);
                None
            }
            PointerEvent::Move(pos) => {
                self.pointer_move(pos);
                None
            }
            PointerEvent::Up => self.pointer_up(),
        }
    }

    pub fn preview(&self) -> Option<Rectangle> {
        match self.state {
            DrawState::Idle => None,
            DrawState::Drawing { anchor, delta } => Some(Rectangle::from_anchor_delta(anchor, delta)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::pos2;

    fn drag(surface: &mut DrawingSurface, from: Pos2, to: Pos2) -> Option<Rectangle> {
        surface.handle(PointerEvent::Down(from));
        surface.handle(PointerEvent::Move(to));
        surface.handle(PointerEvent::Up)
    }

    #[test]
    fn test_drag_in_every_direction() {
        let points = [0.0_f32, 17.0, 50.0, 133.5];
        for &a in &points {
            for &b in &points {
                for &c in &points {
                    for &d in &points {
                        let mut surface = DrawingSurface::new();
                        let r = drag(&mut surface, pos2(a, b), pos2(c, d)).unwrap();
                        assert_eq!(r.x, a.min(c));
                        assert_eq!(r.y, b.min(d));
                        assert_eq!(r.width, (c - a).abs());
                        assert_eq!(r.height, (d - b).abs());
                    }
                }
            }
        }
    }

    #[test]
    fn test_working_rect_is_signed_until_up() {
        let mut surface = DrawingSurface::new();
        surface.pointer_down(pos2(100.0, 100.0));
        surface.pointer_move(pos2(40.0, 70.0));
        assert_eq!(
            surface.state(),
            DrawState::Drawing {
                anchor: pos2(100.0, 100.0),
                delta: egui::vec2(-60.0, -30.0)
            }
        );
        assert_eq!(surface.preview(), Some(Rectangle::new(40.0, 70.0, 60.0, 30.0)));
    }

    #[test]
    fn test_click_without_drag_emits_zero_size() {
        let mut surface = DrawingSurface::new();
        surface.pointer_down(pos2(10.0, 10.0));
        let r = surface.pointer_up().unwrap();
        assert_eq!(r, Rectangle::new(10.0, 10.0, 0.0, 0.0));
    }

    #[test]
    fn test_up_and_move_while_idle_are_noops() {
        let mut surface = DrawingSurface::new();
        surface.pointer_move(pos2(5.0, 5.0));
        assert_eq!(surface.state(), DrawState::Idle);
        assert_eq!(surface.pointer_up(), None);
    }

    #[test]
    fn test_up_returns_to_idle() {
        let mut surface = DrawingSurface::new();
        drag(&mut surface, pos2(0.0, 0.0), pos2(10.0, 10.0));
        assert!(!surface.is_drawing());
        assert_eq!(surface.preview(), None);
        assert_eq!(surface.pointer_up(), None);
    }

    #[test]
    fn test_disabled_surface_ignores_down() {
        let mut surface = DrawingSurface::new();
        surface.set_enabled(false);
        assert!(!surface.pointer_down(pos2(1.0, 1.0)));
        assert!(!surface.is_drawing());
        assert_eq!(surface.pointer_up(), None);
    }

    #[test]
    fn test_abort_discards_gesture() {
        let mut surface = DrawingSurface::new();
        surface.pointer_down(pos2(1.0, 1.0));
        surface.pointer_move(pos2(50.0, 50.0));
        surface.abort();
        assert_eq!(surface.pointer_up(), None);
    }
}
