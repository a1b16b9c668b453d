//! In-memory graphics context and driver shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use doppcapture::quad::QuadVertices;
use doppcapture::{
    BlitCall, BufferId, Capture, DesktopDriver, DesktopEvents, DriverControl, FramebufferId, Graphics, ProgramId,
    SignalPair, TextureId, VertexArrayId, Viewport,
};
use parking_lot::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Draw {
    pub target: FramebufferId,
    pub source: TextureId,
    pub viewport: Viewport,
    pub selected: Option<u32>,
    pub source_desktop: Option<u32>,
}

#[derive(Default)]
pub struct GpuState {
    next_name: u32,
    pub textures: HashMap<u32, (u32, u32)>,
    pub framebuffers: HashSet<u32>,
    pub programs: HashSet<u32>,
    pub buffers: HashSet<u32>,
    pub vertex_arrays: HashSet<u32>,
    pub sampled: HashSet<u32>,
    pub viewport: Viewport,
    pub draws: Vec<Draw>,
    pub finishes: usize,
    pub quads: Vec<QuadVertices>,

    pub desktops: HashMap<u32, (u32, u32)>,
    pub desktop_textures: HashMap<u32, u32>,
    pub selected: Option<u32>,
    pub post_process: Vec<bool>,
}
impl GpuState {
    fn name(&mut self) -> u32 {
        self.next_name += 1;
        self.next_name
    }

    pub fn live_objects(&self) -> usize {
        self.textures.len() + self.framebuffers.len() + self.programs.len() + self.buffers.len() + self.vertex_arrays.len()
    }
}

/// Shared fake GPU plus driver state.
pub struct World {
    pub gpu: Mutex<GpuState>,
    pub context_current: AtomicBool,
    pub incomplete_framebuffers: AtomicBool,
    pub broken_shaders: AtomicBool,
    /// Runs inside every draw, after the draw has been recorded.
    pub on_draw: Mutex<Option<Box<dyn Fn() + Send>>>,
}
impl World {
    pub fn new() -> Arc<Self> {
        let world = World {
            gpu: Mutex::new(GpuState::default()),
            context_current: AtomicBool::new(true),
            incomplete_framebuffers: AtomicBool::new(false),
            broken_shaders: AtomicBool::new(false),
            on_draw: Mutex::new(None),
        };
        world.gpu.lock().viewport = Viewport { x: 3, y: 5, width: 640, height: 480 };
        world.add_desktop(1, 1920, 1080);

        Arc::new(world)
    }

    pub fn add_desktop(&self, id: u32, width: u32, height: u32) {
        self.gpu.lock().desktops.insert(id, (width, height));
    }

    pub fn remove_desktop(&self, id: u32) {
        self.gpu.lock().desktops.remove(&id);
    }

    pub fn set_context(&self, current: bool) {
        self.context_current.store(current, Ordering::SeqCst);
    }

    pub fn draws(&self) -> Vec<Draw> {
        self.gpu.lock().draws.clone()
    }
}

pub struct FakeGl(pub Arc<World>);

impl Graphics for FakeGl {
    fn has_current_context(&self) -> bool {
        self.0.context_current.load(Ordering::SeqCst)
    }

    fn create_texture(&self, width: u32, height: u32) -> TextureId {
        let mut gpu = self.0.gpu.lock();
        let name = gpu.name();
        gpu.textures.insert(name, (width, height));
        gpu.sampled.insert(name);
        TextureId(name)
    }

    fn set_sampling(&self, texture: TextureId) {
        self.0.gpu.lock().sampled.insert(texture.0);
    }

    fn texture_size(&self, texture: TextureId) -> (u32, u32) {
        self.0.gpu.lock().textures.get(&texture.0).copied().unwrap_or((0, 0))
    }

    fn delete_textures(&self, textures: &[TextureId]) {
        let mut gpu = self.0.gpu.lock();
        for t in textures {
            assert!(gpu.textures.remove(&t.0).is_some(), "texture {} deleted twice", t.0);
        }
    }

    fn create_framebuffer(&self, color: TextureId) -> (FramebufferId, bool) {
        let mut gpu = self.0.gpu.lock();
        assert!(gpu.textures.contains_key(&color.0));
        let name = gpu.name();
        gpu.framebuffers.insert(name);
        (FramebufferId(name), !self.0.incomplete_framebuffers.load(Ordering::SeqCst))
    }

    fn delete_framebuffers(&self, framebuffers: &[FramebufferId]) {
        let mut gpu = self.0.gpu.lock();
        for f in framebuffers {
            assert!(gpu.framebuffers.remove(&f.0), "framebuffer {} deleted twice", f.0);
        }
    }

    fn compile_program(&self, vertex: &str, fragment: &str) -> Result<ProgramId, String> {
        if self.0.broken_shaders.load(Ordering::SeqCst) {
            return Err("0:1(1): error: syntax error".into());
        }
        assert!(vertex.contains("gl_Position"));
        assert!(fragment.contains("baseMap"));

        let mut gpu = self.0.gpu.lock();
        let name = gpu.name();
        gpu.programs.insert(name);
        Ok(ProgramId(name))
    }

    fn uniform_location(&self, _program: ProgramId, name: &str) -> Option<i32> {
        (name == "baseMap").then_some(7)
    }

    fn delete_program(&self, program: ProgramId) {
        assert!(self.0.gpu.lock().programs.remove(&program.0));
    }

    fn upload_quad(&self, quad: &QuadVertices) -> (VertexArrayId, BufferId) {
        let mut gpu = self.0.gpu.lock();
        let vertex_array = gpu.name();
        let buffer = gpu.name();
        gpu.vertex_arrays.insert(vertex_array);
        gpu.buffers.insert(buffer);
        gpu.quads.push(*quad);
        (VertexArrayId(vertex_array), BufferId(buffer))
    }

    fn delete_quad(&self, vertex_array: VertexArrayId, buffer: BufferId) {
        let mut gpu = self.0.gpu.lock();
        assert!(gpu.vertex_arrays.remove(&vertex_array.0));
        assert!(gpu.buffers.remove(&buffer.0));
    }

    fn viewport(&self) -> Viewport {
        self.0.gpu.lock().viewport
    }

    fn set_viewport(&self, viewport: Viewport) {
        self.0.gpu.lock().viewport = viewport;
    }

    fn draw_quad(&self, blit: &BlitCall) {
        let draw = {
            let gpu = self.0.gpu.lock();
            assert!(gpu.framebuffers.contains(&blit.target.0));
            assert!(gpu.programs.contains(&blit.program.0));
            assert!(gpu.vertex_arrays.contains(&blit.vertex_array.0));
            assert_eq!(blit.sampler, 7);
            Draw {
                target: blit.target,
                source: blit.source,
                viewport: gpu.viewport,
                selected: gpu.selected,
                source_desktop: gpu.desktop_textures.get(&blit.source.0).copied(),
            }
        };
        // widen the window in which an unguarded select from another
        // session would be observed
        thread::yield_now();
        {
            let mut gpu = self.0.gpu.lock();
            let draw = Draw { selected: draw.selected.filter(|_| gpu.selected == draw.selected), ..draw };
            gpu.draws.push(draw);
        }
        if let Some(hook) = self.0.on_draw.lock().as_ref() {
            hook();
        }
    }

    fn finish(&self) {
        self.0.gpu.lock().finishes += 1;
    }

    fn read_pixels(&self, framebuffer: FramebufferId, width: u32, height: u32) -> Vec<u8> {
        assert!(self.0.gpu.lock().framebuffers.contains(&framebuffer.0));
        (0..height)
            .flat_map(|row| std::iter::repeat([row as u8, 0, 0, 255]).take(width as usize).flatten())
            .collect()
    }
}

pub struct FakeDriver {
    pub world: Arc<World>,
    pub missing: Option<&'static str>,
    loaded: bool,
}
impl FakeDriver {
    pub fn new(world: &Arc<World>) -> Self {
        Self { world: world.clone(), missing: None, loaded: false }
    }
}

impl DesktopDriver for FakeDriver {
    fn load_entry_points(&mut self) -> Result<(), String> {
        if let Some(name) = self.missing {
            return Err(format!("{} is not exported by the driver", name));
        }
        self.loaded = true;
        Ok(())
    }

    fn select_desktop(&self, desktop_id: u32) -> bool {
        assert!(self.loaded);
        let mut gpu = self.world.gpu.lock();
        if gpu.desktops.contains_key(&desktop_id) {
            gpu.selected = Some(desktop_id);
            true
        } else {
            false
        }
    }

    fn desktop_texture(&self) -> TextureId {
        let mut gpu = self.world.gpu.lock();
        let Some(desktop) = gpu.selected else {
            return TextureId(0);
        };
        let size = gpu.desktops[&desktop];
        let name = gpu.name();
        gpu.textures.insert(name, size);
        gpu.desktop_textures.insert(name, desktop);
        TextureId(name)
    }

    fn enable_post_process(&self, enable: bool) {
        self.world.gpu.lock().post_process.push(enable);
    }
}

pub struct FakeControl {
    pub enabled: AtomicBool,
    pub can_enable: bool,
    pub refuse_events: bool,
    pub opened: Mutex<Vec<Arc<SignalPair>>>,
}
impl FakeControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            enabled: AtomicBool::new(true),
            can_enable: true,
            refuse_events: false,
            opened: Mutex::new(Vec::new()),
        })
    }

    pub fn without_events() -> Arc<Self> {
        Arc::new(Self {
            refuse_events: true,
            ..Self::plain()
        })
    }

    pub fn disabled(can_enable: bool) -> Arc<Self> {
        Arc::new(Self {
            enabled: AtomicBool::new(false),
            can_enable,
            ..Self::plain()
        })
    }

    fn plain() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            can_enable: true,
            refuse_events: false,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Arc<SignalPair> {
        self.opened.lock().last().cloned().expect("no desktop events opened")
    }
}

impl DriverControl for FakeControl {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn enable(&self) -> bool {
        if self.can_enable {
            self.enabled.store(true, Ordering::SeqCst);
        }
        self.can_enable
    }

    fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    fn open_desktop_events(&self) -> Option<Arc<dyn DesktopEvents>> {
        if self.refuse_events {
            return None;
        }
        let events = Arc::new(SignalPair::new());
        self.opened.lock().push(events.clone());
        Some(events)
    }
}

pub type FakeCapture = Capture<FakeGl, FakeDriver>;

pub fn session(world: &Arc<World>, control: &Arc<FakeControl>, desktop: u32) -> FakeCapture {
    Capture::new(desktop, FakeGl(world.clone()), FakeDriver::new(world), control.clone()).expect("driver enabled")
}
