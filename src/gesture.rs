//! Drag-versus-tap disambiguation for a horizontally scrollable tag strip.
//!
//! One [`GestureDisambiguator`] per strip. The host feeds it pointer events and
//! applies the returned outcomes (scroll offset, default suppression,
//! navigation). A drag must survive the pointer release so that the click the
//! browser fires afterwards can be swallowed; that is what
//! [`GestureState::DragReleased`] is for.

/// Horizontal displacement, in pixels, beyond which a press becomes a drag.
pub const DRAG_THRESHOLD_PX: f64 = 5.0;
/// Scroll distance per pixel of pointer travel while dragging.
pub const DRAG_AMPLIFICATION: f64 = 2.0;

/// Per-press bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureSession {
    pub origin_x: f64,
    pub origin_scroll: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    Pressed(GestureSession),
    Dragging(GestureSession),
    /// Pointer released after a drag; the next click is swallowed.
    DragReleased,
}

/// What the host should do after a pointer move.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MoveOutcome {
    /// New scroll offset for the strip, when dragging.
    pub scroll_to: Option<f64>,
    /// Suppress the browser default (text selection).
    pub prevent_default: bool,
}

/// What was under the pointer when the click fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickTarget {
    /// An interactive tag element.
    Tag { url: String },
    /// Anything else inside the strip.
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Swallow the click entirely: no navigation, no propagation.
    Suppress,
    /// Stop propagation and navigate to the tag.
    NavigateTag(String),
    /// Let the click bubble to the enclosing card.
    Propagate,
}

#[derive(Debug, Clone, Default)]
pub struct GestureDisambiguator {
    state: GestureState,
}

impl GestureDisambiguator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    /// Start a session at pointer `x` with the strip scrolled to `scroll_offset`.
    pub fn pointer_down(&mut self, x: f64, scroll_offset: f64) {
        self.state = GestureState::Pressed(GestureSession {
            origin_x: x,
            origin_scroll: scroll_offset,
        });
    }

    pub fn pointer_move(&mut self, x: f64) -> MoveOutcome {
        let session = match self.state {
            GestureState::Pressed(s) | GestureState::Dragging(s) => s,
            GestureState::Idle | GestureState::DragReleased => return MoveOutcome::default(),
        };

        let dx = x - session.origin_x;
        if let GestureState::Pressed(_) = self.state {
            if dx.abs() <= DRAG_THRESHOLD_PX {
                return MoveOutcome::default();
            }
            tracing::trace!(dx, "Pointer displacement crossed drag threshold");
            self.state = GestureState::Dragging(session);
        }

        MoveOutcome {
            scroll_to: Some(session.origin_scroll - dx * DRAG_AMPLIFICATION),
            prevent_default: true,
        }
    }

    /// Pointer released over the strip.
    pub fn pointer_up(&mut self) {
        self.end_session();
    }

    /// Pointer left the strip; the session is discarded but a drag still
    /// suppresses the next click.
    pub fn pointer_leave(&mut self) {
        self.end_session();
    }

    fn end_session(&mut self) {
        self.state = match self.state {
            GestureState::Dragging(_) | GestureState::DragReleased => GestureState::DragReleased,
            GestureState::Idle | GestureState::Pressed(_) => GestureState::Idle,
        };
    }

    /// Evaluate the click that follows a release.
    pub fn click(&mut self, target: &ClickTarget) -> ClickOutcome {
        let was_drag = matches!(
            self.state,
            GestureState::Dragging(_) | GestureState::DragReleased
        );
        self.state = GestureState::Idle;

        if was_drag {
            return ClickOutcome::Suppress;
        }
        match target {
            ClickTarget::Tag { url } => ClickOutcome::NavigateTag(url.clone()),
            ClickTarget::Other => ClickOutcome::Propagate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag() -> ClickTarget {
        ClickTarget::Tag {
            url: "/tag/rust".into(),
        }
    }

    #[test]
    fn test_small_movement_stays_pressed() {
        let mut g = GestureDisambiguator::new();
        g.pointer_down(100.0, 40.0);
        let out = g.pointer_move(103.0);
        assert_eq!(out, MoveOutcome::default());
        assert!(matches!(g.state(), GestureState::Pressed(_)));
    }

    #[test]
    fn test_tap_on_tag_navigates() {
        let mut g = GestureDisambiguator::new();
        g.pointer_down(100.0, 0.0);
        g.pointer_move(97.0);
        g.pointer_up();
        assert_eq!(g.click(&tag()), ClickOutcome::NavigateTag("/tag/rust".into()));
        assert_eq!(g.state(), GestureState::Idle);
    }

    #[test]
    fn test_tap_elsewhere_propagates() {
        let mut g = GestureDisambiguator::new();
        g.pointer_down(10.0, 0.0);
        g.pointer_up();
        assert_eq!(g.click(&ClickTarget::Other), ClickOutcome::Propagate);
    }

    #[test]
    fn test_drag_scrolls_with_amplification() {
        let mut g = GestureDisambiguator::new();
        g.pointer_down(100.0, 50.0);
        let out = g.pointer_move(88.0);
        assert_eq!(out.scroll_to, Some(74.0));
        assert!(out.prevent_default);
        let out = g.pointer_move(110.0);
        assert_eq!(out.scroll_to, Some(30.0));
    }

    #[test]
    fn test_drag_suppresses_following_click() {
        let mut g = GestureDisambiguator::new();
        g.pointer_down(100.0, 0.0);
        g.pointer_move(112.0);
        g.pointer_up();
        assert_eq!(g.state(), GestureState::DragReleased);
        assert_eq!(g.click(&tag()), ClickOutcome::Suppress);
        // Flag is consumed by that click.
        assert_eq!(g.click(&tag()), ClickOutcome::NavigateTag("/tag/rust".into()));
    }

    #[test]
    fn test_leave_after_drag_keeps_suppression() {
        let mut g = GestureDisambiguator::new();
        g.pointer_down(0.0, 0.0);
        g.pointer_move(-20.0);
        g.pointer_leave();
        assert_eq!(g.click(&ClickTarget::Other), ClickOutcome::Suppress);
    }

    #[test]
    fn test_leave_without_drag_discards_session() {
        let mut g = GestureDisambiguator::new();
        g.pointer_down(0.0, 0.0);
        g.pointer_leave();
        assert_eq!(g.state(), GestureState::Idle);
        assert_eq!(g.pointer_move(50.0), MoveOutcome::default());
    }

    #[test]
    fn test_exact_threshold_is_not_a_drag() {
        let mut g = GestureDisambiguator::new();
        g.pointer_down(0.0, 0.0);
        assert_eq!(g.pointer_move(5.0), MoveOutcome::default());
        assert!(g.pointer_move(5.5).prevent_default);
    }
}
