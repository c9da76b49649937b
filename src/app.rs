// Application state module
// Tracks which image is shown and how far it has been panned

/// User intent decoded from a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Next,
    Previous,
    /// Repaint without changing anything
    Refresh,
    /// Resize the window to the current image
    FitWindow,
    /// Keyboard pan, in multiples of the configured increment
    Pan { dx: i32, dy: i32 },
}

/// What the window has to do after an action was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Redraw,
    FitWindow,
    Exit,
}

/// Per-window view state
#[derive(Debug, Clone)]
pub struct ViewState {
    /// Index of the image on screen
    index: usize,
    /// Number of images available
    count: usize,
    /// Pan offset added to the centered position
    origin: (i32, i32),
    /// Whether the left button is held for panning
    panning: bool,
    /// Pointer position at the previous drag step
    last_pointer: (i32, i32),
    /// Keyboard pan step in pixels
    increment: i32,
}

impl ViewState {
    /// Create a view over `count` images; `count` must be non-zero
    pub fn new(count: usize, increment: i32) -> Self {
        debug_assert!(count > 0);
        Self {
            index: 0,
            count,
            origin: (0, 0),
            panning: false,
            last_pointer: (0, 0),
            increment,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn origin(&self) -> (i32, i32) {
        self.origin
    }

    pub fn is_panning(&self) -> bool {
        self.panning
    }

    /// Advance to the next image, wrapping to the first
    pub fn next(&mut self) {
        self.index = (self.index + 1) % self.count;
        self.origin = (0, 0);
    }

    /// Go back to the previous image, wrapping to the last
    pub fn previous(&mut self) {
        self.index = self.index.checked_sub(1).unwrap_or(self.count - 1);
        self.origin = (0, 0);
    }

    pub fn reset_origin(&mut self) {
        self.origin = (0, 0);
    }

    /// Left button pressed at `(x, y)`
    pub fn press(&mut self, x: i32, y: i32) {
        self.panning = true;
        self.last_pointer = (x, y);
    }

    /// Left button released (or pointer gone)
    pub fn release(&mut self) {
        self.panning = false;
        self.last_pointer = (0, 0);
    }

    /// Pointer moved; returns true when the image moved and needs a repaint
    pub fn motion(&mut self, x: i32, y: i32) -> bool {
        if !self.panning {
            return false;
        }
        let dx = x.saturating_sub(self.last_pointer.0);
        let dy = y.saturating_sub(self.last_pointer.1);
        self.origin.0 = self.origin.0.saturating_add(dx);
        self.origin.1 = self.origin.1.saturating_add(dy);
        self.last_pointer = (x, y);
        true
    }

    /// Move the view by whole increments. Positive `dx` looks further right,
    /// which shifts the image left. Offsets saturate at the `i32` range.
    pub fn pan(&mut self, dx: i32, dy: i32) {
        self.origin.0 = self.origin.0.saturating_sub(dx.saturating_mul(self.increment));
        self.origin.1 = self.origin.1.saturating_sub(dy.saturating_mul(self.increment));
    }

    pub fn apply(&mut self, action: Action) -> Effect {
        match action {
            Action::Quit => Effect::Exit,
            Action::Next => {
                self.next();
                Effect::Redraw
            }
            Action::Previous => {
                self.previous();
                Effect::Redraw
            }
            Action::Refresh => Effect::Redraw,
            Action::FitWindow => {
                self.reset_origin();
                Effect::FitWindow
            }
            Action::Pan { dx, dy } => {
                self.pan(dx, dy);
                Effect::Redraw
            }
        }
    }

    /// Top-left corner of the image inside a window of `window` size
    pub fn placement(&self, image: (u32, u32), window: (u32, u32)) -> (i32, i32) {
        let (x, y) = center(image, window);
        (x.saturating_add(self.origin.0), y.saturating_add(self.origin.1))
    }
}

/// Center the image on each axis where it is smaller than the window
fn center(image: (u32, u32), window: (u32, u32)) -> (i32, i32) {
    let axis = |img: u32, win: u32| {
        if img < win {
            ((win - img) / 2) as i32
        } else {
            0
        }
    };
    (axis(image.0, window.0), axis(image.1, window.1))
}
