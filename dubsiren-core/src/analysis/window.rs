/// first-order high-pass, `y = x - alpha * x[-1]`
#[derive(Clone, Copy, Debug)]
pub struct Preemphasis {
    alpha: f32,
    prev: f32,
}

impl Default for Preemphasis {
    fn default() -> Self {
        Self::new(0.97)
    }
}

impl Preemphasis {
    pub fn new(alpha: f32) -> Self {
        Self { alpha, prev: 0. }
    }

    pub fn apply(&mut self, x: f32) -> f32 {
        let y = x - self.alpha * self.prev;
        self.prev = x;
        y
    }
}

/// Sliding analysis window over a sample stream.
///
/// Keeps the last `SIZE` samples and offers a new window every
/// `SIZE / OVERLAP` pushes.
pub struct Windower<const SIZE: usize, const OVERLAP: usize> {
    history: [f32; SIZE],
    write_pos: usize,
    /// pushes since the last window
    pending: usize,
    preemphasis: Option<Preemphasis>,
}

impl<const SIZE: usize, const OVERLAP: usize> Default for Windower<SIZE, OVERLAP> {
    fn default() -> Self {
        Self::new(Some(Preemphasis::default()))
    }
}

impl<const SIZE: usize, const OVERLAP: usize> Windower<SIZE, OVERLAP> {
    pub const HOP: usize = SIZE / OVERLAP;

    pub fn new(preemphasis: Option<Preemphasis>) -> Self {
        const { assert!(OVERLAP > 0 && SIZE % OVERLAP == 0) };
        Self {
            history: [0.; SIZE],
            write_pos: 0,
            pending: 0,
            preemphasis,
        }
    }

    /// true once a new window is available
    pub fn push(&mut self, sample: f32) -> bool {
        let sample = match &mut self.preemphasis {
            Some(filter) => filter.apply(sample),
            None => sample,
        };
        self.history[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % SIZE;
        self.pending += 1;
        if self.write_pos % Self::HOP == 0 {
            self.pending = 0;
            true
        } else {
            false
        }
    }

    /// most recent `SIZE` samples, oldest first
    pub fn window(&self, out: &mut [f32; SIZE]) {
        let (newer, older) = self.history.split_at(self.write_pos);
        out[..older.len()].copy_from_slice(older);
        out[older.len()..].copy_from_slice(newer);
    }

    /// zero-pad to the next hop if anything is pending; true if that
    /// completed a window
    pub fn flush(&mut self) -> bool {
        if self.pending == 0 {
            return false;
        }
        while !self.push(0.) {}
        true
    }

    pub fn reset(&mut self) {
        self.history = [0.; SIZE];
        self.write_pos = 0;
        self.pending = 0;
        if let Some(filter) = &mut self.preemphasis {
            filter.prev = 0.;
        }
    }
}
