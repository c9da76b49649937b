// Wayland integration module
// Owns the viewer window and maps window-system events onto the view state

use crate::app::{Action, Effect, ViewState};
use crate::cli::ParsedArgs;
use crate::image_loader::ImageData;
use crate::profiler::Profiler;
use crate::render;
use anyhow::{bail, Context, Result};
use log::{debug, error, info, trace};
use smithay_client_toolkit::{
    compositor::{CompositorHandler, CompositorState},
    delegate_compositor, delegate_keyboard, delegate_output, delegate_pointer, delegate_registry,
    delegate_seat, delegate_shm, delegate_xdg_shell, delegate_xdg_window,
    output::{OutputHandler, OutputState},
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    seat::{
        keyboard::{KeyEvent, KeyboardHandler, Keysym, Modifiers},
        pointer::{PointerEvent, PointerEventKind, PointerHandler},
        Capability, SeatHandler, SeatState,
    },
    shell::{
        xdg::{
            window::{Window, WindowConfigure, WindowDecorations, WindowHandler},
            XdgShell,
        },
        WaylandSurface,
    },
    shm::{
        slot::{Buffer, SlotPool},
        Shm, ShmHandler,
    },
};
use std::time::Instant;
use wayland_client::{
    globals::registry_queue_init,
    protocol::{wl_keyboard, wl_output, wl_pointer, wl_seat, wl_shm, wl_surface},
    Connection, QueueHandle,
};

/// Mouse button constant
const BTN_LEFT: u32 = 272;

/// Largest window edge we will allocate a buffer for
const MAX_SIZE: u32 = 8192;

/// Viewer window state
struct ViewerWindow {
    // Registry state
    registry_state: RegistryState,
    // Seat state for input handling
    seat_state: SeatState,
    // Output state for display info
    output_state: OutputState,
    // Shared memory for buffer allocation
    shm: Shm,

    // Application-specific state
    images: Vec<ImageData>,
    view: ViewState,
    profiler: Option<Profiler>,
    should_exit: bool,
    // Set when the window system fails underneath us; ends the event loop
    fatal: Option<anyhow::Error>,

    // Surface and buffer management
    window: Window,
    pool: SlotPool,
    buffer: Option<Buffer>,
    width: u32,
    height: u32,
    configured: bool,
    needs_redraw: bool,
    // Index the window title currently describes
    titled: Option<usize>,
}

impl ViewerWindow {
    /// Make sure the pool can back a buffer of the current size
    fn new_buffer(&mut self) {
        let size = self.width as usize * self.height as usize * 4;
        // Drop the old buffer first; its slot is reused once the compositor lets go
        self.buffer = None;
        if self.pool.len() < size {
            let resized = self.pool.resize(size).with_context(|| {
                format!("Failed to resize buffer pool to {}x{}", self.width, self.height)
            });
            if let Err(e) = resized {
                self.fail(e);
                return;
            }
            debug!("Buffer pool grown to {} bytes", size);
        }
        self.needs_redraw = true;
    }

    fn fail(&mut self, err: anyhow::Error) {
        error!("{:#}", err);
        self.fatal = Some(err);
        self.should_exit = true;
    }

    fn handle_action(&mut self, action: Action) {
        let before = self.view.index();
        match self.view.apply(action) {
            Effect::Redraw => self.needs_redraw = true,
            Effect::FitWindow => self.fit_window(),
            Effect::Exit => {
                info!("Exit key pressed");
                self.should_exit = true;
            }
        }
        if self.view.index() != before {
            if let Some(profiler) = self.profiler.as_mut() {
                profiler.increment_counter("navigations");
            }
        }
    }

    /// Resize the window to the image on screen
    fn fit_window(&mut self) {
        let (w, h) = self.images[self.view.index()].size();
        self.width = w.clamp(1, MAX_SIZE);
        self.height = h.clamp(1, MAX_SIZE);
        info!("Resizing window to {}x{}", self.width, self.height);
        self.new_buffer();
    }

    fn update_title(&mut self) {
        let index = self.view.index();
        if self.titled == Some(index) {
            return;
        }
        let image = &self.images[index];
        self.window
            .set_title(format!("{} ({}/{})", image.name, index + 1, self.images.len()));
        self.titled = Some(index);
    }

    /// Compose the current image into a fresh buffer and present it
    fn draw(&mut self) -> Result<()> {
        if !self.configured {
            return Ok(());
        }
        let started = Instant::now();
        self.update_title();

        let width = self.width;
        let height = self.height;
        let stride = width as i32 * 4;

        let image = &self.images[self.view.index()];
        let dest = self.view.placement(image.size(), (width, height));

        let (buffer, canvas) = self
            .pool
            .create_buffer(width as i32, height as i32, stride, wl_shm::Format::Argb8888)
            .with_context(|| format!("Failed to create buffer {}x{}", width, height))?;

        render::compose(canvas, width, height, image, dest);

        let surface = self.window.wl_surface();
        buffer.attach_to(surface).context("Failed to attach buffer")?;
        surface.damage_buffer(0, 0, width as i32, height as i32);
        self.window.commit();

        self.buffer = Some(buffer);
        self.needs_redraw = false;

        if let Some(profiler) = self.profiler.as_mut() {
            profiler.add_measurement("draw", started.elapsed());
            profiler.increment_counter("frames");
        }
        Ok(())
    }
}

/// Translate a pressed key into a viewer action
fn action_for_key(keysym: Keysym) -> Option<Action> {
    match keysym {
        Keysym::Escape | Keysym::q | Keysym::Q => Some(Action::Quit),
        Keysym::Right => Some(Action::Next),
        Keysym::Left => Some(Action::Previous),
        Keysym::r | Keysym::R => Some(Action::Refresh),
        Keysym::z | Keysym::Z => Some(Action::FitWindow),
        Keysym::h => Some(Action::Pan { dx: -1, dy: 0 }),
        Keysym::l => Some(Action::Pan { dx: 1, dy: 0 }),
        Keysym::k => Some(Action::Pan { dx: 0, dy: -1 }),
        Keysym::j => Some(Action::Pan { dx: 0, dy: 1 }),
        _ => None,
    }
}

/// Size of the window when it first opens
fn initial_size(args: &ParsedArgs, first: &ImageData) -> (u32, u32) {
    if args.auto_resize {
        info!("auto-resize from [{}]...", first.name);
        (first.width.clamp(1, MAX_SIZE), first.height.clamp(1, MAX_SIZE))
    } else {
        (args.width.clamp(1, MAX_SIZE), args.height.clamp(1, MAX_SIZE))
    }
}

// Implement required traits for smithay-client-toolkit

impl CompositorHandler for ViewerWindow {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_factor: i32,
    ) {
        debug!("Scale factor changed");
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {
        debug!("Transform changed");
    }

    fn frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _time: u32,
    ) {
    }

    fn surface_enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }

    fn surface_leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }
}

impl OutputHandler for ViewerWindow {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("New output detected");
    }

    fn update_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("Output updated");
    }

    fn output_destroyed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("Output destroyed");
    }
}

impl WindowHandler for ViewerWindow {
    fn request_close(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _window: &Window) {
        info!("Window closed");
        self.should_exit = true;
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _window: &Window,
        configure: WindowConfigure,
        _serial: u32,
    ) {
        debug!("Window configured: {:?}", configure.new_size);

        // No suggestion means we pick; keep the size we already have
        let (new_w, new_h) = configure.new_size;
        if let Some(w) = new_w {
            self.width = w.get().min(MAX_SIZE);
        }
        if let Some(h) = new_h {
            self.height = h.get().min(MAX_SIZE);
        }

        self.configured = true;
        self.new_buffer();
    }
}

impl SeatHandler for ViewerWindow {
    fn seat_state(&mut self) -> &mut SeatState {
        &mut self.seat_state
    }

    fn new_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {
        debug!("New seat");
    }

    fn new_capability(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        seat: wl_seat::WlSeat,
        capability: Capability,
    ) {
        debug!("New capability: {:?}", capability);

        if capability == Capability::Keyboard {
            if let Err(e) = self.seat_state.get_keyboard(qh, &seat, None) {
                error!("Failed to get keyboard: {}", e);
            }
        }
        if capability == Capability::Pointer {
            if let Err(e) = self.seat_state.get_pointer(qh, &seat) {
                error!("Failed to get pointer: {}", e);
            }
        }
    }

    fn remove_capability(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _seat: wl_seat::WlSeat,
        capability: Capability,
    ) {
        debug!("Capability removed: {:?}", capability);
        if capability == Capability::Pointer {
            self.view.release();
        }
    }

    fn remove_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {
        debug!("Seat removed");
    }
}

impl KeyboardHandler for ViewerWindow {
    fn enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _surface: &wl_surface::WlSurface,
        _serial: u32,
        _raw: &[u32],
        _keysyms: &[Keysym],
    ) {
        debug!("Keyboard entered surface");
    }

    fn leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _surface: &wl_surface::WlSurface,
        _serial: u32,
    ) {
        debug!("Keyboard left surface");
    }

    fn press_key(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        event: KeyEvent,
    ) {
        match action_for_key(event.keysym) {
            Some(action) => {
                debug!("Key {:?} -> {:?}", event.keysym, action);
                self.handle_action(action);
            }
            None => debug!("Unbound key: {:?}", event.keysym),
        }
    }

    fn release_key(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        _event: KeyEvent,
    ) {
    }

    fn update_modifiers(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        _modifiers: Modifiers,
        _layout: u32,
    ) {
    }
}

impl PointerHandler for ViewerWindow {
    fn pointer_frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _pointer: &wl_pointer::WlPointer,
        events: &[PointerEvent],
    ) {
        for event in events {
            let (x, y) = (event.position.0 as i32, event.position.1 as i32);
            match event.kind {
                PointerEventKind::Enter { .. } => {
                    debug!("Pointer entered");
                }
                PointerEventKind::Leave { .. } => {
                    debug!("Pointer left");
                    if self.view.is_panning() {
                        self.view.release();
                    }
                }
                PointerEventKind::Motion { .. } => {
                    if self.view.motion(x, y) {
                        trace!("Pan origin {:?}", self.view.origin());
                        self.needs_redraw = true;
                    }
                }
                PointerEventKind::Press { button, .. } => {
                    if button == BTN_LEFT {
                        self.view.press(x, y);
                    }
                }
                PointerEventKind::Release { button, .. } => {
                    if button == BTN_LEFT {
                        self.view.release();
                    }
                }
                PointerEventKind::Axis { .. } => {}
            }
        }
    }
}

impl ShmHandler for ViewerWindow {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.shm
    }
}

impl ProvidesRegistryState for ViewerWindow {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }

    registry_handlers![OutputState, SeatState];
}

// Delegate macros
delegate_compositor!(ViewerWindow);
delegate_output!(ViewerWindow);
delegate_xdg_shell!(ViewerWindow);
delegate_xdg_window!(ViewerWindow);
delegate_seat!(ViewerWindow);
delegate_keyboard!(ViewerWindow);
delegate_pointer!(ViewerWindow);
delegate_shm!(ViewerWindow);
delegate_registry!(ViewerWindow);

/// Open the viewer window and run until the user quits
pub fn run(images: Vec<ImageData>, args: &ParsedArgs, profiler: Option<Profiler>) -> Result<()> {
    let Some(first) = images.first() else {
        bail!("No images specified could be shown. Quitting...");
    };
    let (width, height) = initial_size(args, first);

    info!("Connecting to Wayland display");

    // Connect to Wayland display
    let conn = Connection::connect_to_env().context("Failed to connect to Wayland display")?;

    // Initialize registry and event queue
    let (globals, mut event_queue) =
        registry_queue_init(&conn).context("Failed to initialize registry")?;
    let qh = event_queue.handle();

    // Initialize required globals
    let compositor_state =
        CompositorState::bind(&globals, &qh).context("Failed to bind compositor")?;
    let xdg_shell = XdgShell::bind(&globals, &qh).context("Failed to bind xdg shell")?;
    let shm = Shm::bind(&globals, &qh).context("Failed to bind shm")?;

    let pool = SlotPool::new(width as usize * height as usize * 4, &shm)
        .with_context(|| format!("Failed to create buffer pool for {}x{}", width, height))?;

    // Create the window; the first configure triggers the first paint
    let surface = compositor_state.create_surface(&qh);
    let window = xdg_shell.create_window(surface, WindowDecorations::RequestServer, &qh);
    window.set_title("iview");
    window.set_app_id("iview");
    window.commit();

    let view = ViewState::new(images.len(), args.increment);
    let mut app = ViewerWindow {
        registry_state: RegistryState::new(&globals),
        seat_state: SeatState::new(&globals, &qh),
        output_state: OutputState::new(&globals, &qh),
        shm,
        images,
        view,
        profiler,
        should_exit: false,
        fatal: None,
        window,
        pool,
        buffer: None,
        width,
        height,
        configured: false,
        needs_redraw: false,
        titled: None,
    };

    info!("Starting event loop with {} image(s)", app.images.len());
    info!("Controls: Left/Right to switch images, drag or h/j/k/l to pan, z to fit, q to quit");

    // Main event loop
    loop {
        event_queue.blocking_dispatch(&mut app)?;

        if app.should_exit {
            break;
        }
        // Coalesce everything this dispatch asked for into one frame
        if app.needs_redraw {
            if let Err(e) = app.draw() {
                app.fail(e);
                break;
            }
        }
    }

    info!("Exiting application");
    shut_down(app.profiler.take(), app.fatal.take())
}

/// Write the profile, even when leaving because of a fatal error, then report
/// that error in preference to a profile write failure.
fn shut_down(profiler: Option<Profiler>, fatal: Option<anyhow::Error>) -> Result<()> {
    let written = profiler.map_or(Ok(()), Profiler::finish);
    match fatal {
        Some(err) => {
            if let Err(e) = written {
                error!("{:#}", e);
            }
            Err(err)
        }
        None => written,
    }
}
