//! Linear opacity tween driven by frame deltas.

/// Tween from `from` to `to` over `duration_ms`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fade {
    from: f32,
    to: f32,
    duration_ms: f32,
    elapsed_ms: f32,
}

impl Fade {
    pub fn new(from: f32, to: f32, duration_ms: f32) -> Self {
        Self {
            from,
            to,
            duration_ms: duration_ms.max(0.0),
            elapsed_ms: 0.0,
        }
    }

    pub fn out(duration_ms: f32) -> Self {
        Self::new(1.0, 0.0, duration_ms)
    }

    pub fn into_view(duration_ms: f32) -> Self {
        Self::new(0.0, 1.0, duration_ms)
    }

    /// Advance by `dt_ms` and return the new value.
    pub fn advance(&mut self, dt_ms: f32) -> f32 {
        self.elapsed_ms = (self.elapsed_ms + dt_ms.max(0.0)).min(self.duration_ms);
        self.value()
    }

    pub fn value(&self) -> f32 {
        if self.is_finished() {
            return self.to;
        }
        let t = self.elapsed_ms / self.duration_ms;
        self.from + (self.to - self.from) * t
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed_ms >= self.duration_ms
    }
}
