//! Lifecycle tests driving the system through a mock binder
//!
//! No DRM device needed: the binding stands in for device, allocator and
//! context, and counts what the scanout path asks of it.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;
use std::rc::Rc;

use eglgbm::config::Config;
use eglgbm::framework::{
    BufferMode, Core, Dimension, LayerFuncs, LayerOptions, OutputConfig, OutputConfigFlags,
    PixelFormat, Region, RegionConfigFlags, ScreenFuncs,
};
use eglgbm::modes::Resolution;
use eglgbm::rotation::{PanelOrientation, Rotation};
use eglgbm::scanout::{FramebufferId, ScanoutTarget};
use eglgbm::shared::{Arena, ArenaSurfacePools};
use eglgbm::{Binder, Binding, BindError, Error, System};

#[derive(Default)]
struct Stats {
    binds: RefCell<Vec<String>>,
    dropped: Cell<u32>,
    swaps: Cell<u32>,
    registrations: Cell<u32>,
    crtc_sets: Cell<u32>,
    flips: Cell<u32>,
    released: Cell<u32>,
}

struct MockBinding {
    stats: Rc<Stats>,
    size: Dimension,
    orientation: Option<PanelOrientation>,
    framebuffers: HashMap<u32, FramebufferId>,
    next_fb: u32,
    fail_crtc: bool,
}

impl Drop for MockBinding {
    fn drop(&mut self) {
        self.stats.dropped.set(self.stats.dropped.get() + 1);
    }
}

impl ScanoutTarget for MockBinding {
    // a single buffer, handed out on every lock
    type Buffer = u32;

    fn swap_buffers(&mut self) -> anyhow::Result<()> {
        self.stats.swaps.set(self.stats.swaps.get() + 1);
        Ok(())
    }

    fn lock_front_buffer(&mut self) -> anyhow::Result<Option<u32>> {
        Ok(Some(1))
    }

    fn cached_framebuffer(&self, buffer: &u32) -> Option<FramebufferId> {
        self.framebuffers.get(buffer).copied()
    }

    fn register_framebuffer(&mut self, buffer: &mut u32) -> anyhow::Result<FramebufferId> {
        self.stats.registrations.set(self.stats.registrations.get() + 1);
        self.next_fb += 1;
        let fb = FramebufferId(self.next_fb);
        self.framebuffers.insert(*buffer, fb);
        Ok(fb)
    }

    fn set_crtc(&mut self, _fb: FramebufferId) -> anyhow::Result<()> {
        if self.fail_crtc {
            anyhow::bail!("SETCRTC rejected");
        }
        self.stats.crtc_sets.set(self.stats.crtc_sets.get() + 1);
        Ok(())
    }

    fn page_flip(&mut self, _fb: FramebufferId) -> anyhow::Result<()> {
        self.stats.flips.set(self.stats.flips.get() + 1);
        Ok(())
    }

    fn wait_for_flip(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn release_buffer(&mut self, _buffer: u32) {
        self.stats.released.set(self.stats.released.get() + 1);
    }
}

impl Binding for MockBinding {
    fn physical_size(&self) -> Dimension {
        self.size
    }

    fn panel_orientation(&self) -> anyhow::Result<Option<PanelOrientation>> {
        Ok(self.orientation)
    }
}

struct MockBinder {
    stats: Rc<Stats>,
    size: Dimension,
    orientation: Option<PanelOrientation>,
    fail: Option<fn() -> BindError>,
    fail_crtc: bool,
}

impl MockBinder {
    fn new(w: i32, h: i32) -> Self {
        Self {
            stats: Rc::new(Stats::default()),
            size: Dimension::new(w, h),
            orientation: None,
            fail: None,
            fail_crtc: false,
        }
    }
}

impl Binder for MockBinder {
    type Binding = MockBinding;

    fn bind(&self, device_path: &str) -> Result<MockBinding, BindError> {
        if let Some(fail) = self.fail {
            return Err(fail());
        }
        self.stats.binds.borrow_mut().push(device_path.to_string());
        Ok(MockBinding {
            stats: Rc::clone(&self.stats),
            size: self.size,
            orientation: self.orientation,
            framebuffers: HashMap::new(),
            next_fb: 0,
            fail_crtc: self.fail_crtc,
        })
    }
}

fn test_arena(name: &str) -> Arena {
    let dir: PathBuf =
        std::env::temp_dir().join(format!("eglgbm-lifecycle-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    Arena::open(dir).unwrap()
}

fn arena_entries(arena: &Arena) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(arena.dir())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.system.device = Some("/dev/dri/card7".to_string());
    config
}

#[test]
fn test_join_without_master_is_not_found() {
    let arena = test_arena("join-none");
    let pools = ArenaSurfacePools::new(&arena);
    let config = test_config();
    let core = Core::new(&arena, &pools, &config);
    let binder = MockBinder::new(1920, 1080);

    let result = System::join(&core, &binder);

    assert!(matches!(result, Err(Error::NotFound(_))));
    assert!(binder.stats.binds.borrow().is_empty());
    assert!(arena_entries(&arena).is_empty());
}

#[test]
fn test_failed_master_leaves_no_shared_state() {
    let arena = test_arena("master-fail");
    let pools = ArenaSurfacePools::new(&arena);
    let config = test_config();
    let core = Core::new(&arena, &pools, &config);
    let mut binder = MockBinder::new(1920, 1080);
    binder.fail = Some(|| BindError::ContextCreateFailed("no ES2 context".to_string()));

    let result = System::initialize(&core, &binder);

    assert!(matches!(
        result,
        Err(Error::Init(BindError::ContextCreateFailed(_)))
    ));
    assert!(arena_entries(&arena).is_empty());

    let joiner = MockBinder::new(1920, 1080);
    assert!(matches!(
        System::join(&core, &joiner),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn test_master_and_joiner_share_mode() {
    let arena = test_arena("share-mode");
    let pools = ArenaSurfacePools::new(&arena);
    let config = test_config();
    let core = Core::new(&arena, &pools, &config);
    let master_binder = MockBinder::new(1920, 1080);
    let joiner_binder = MockBinder::new(1920, 1080);

    let mut master = System::initialize(&core, &master_binder).unwrap();
    master.screen().init_screen().unwrap();
    assert_eq!(master.screen().screen_size().unwrap(), Dimension::new(1920, 1080));

    let mut joiner = System::join(&core, &joiner_binder).unwrap();
    assert_eq!(joiner_binder.stats.binds.borrow().as_slice(), ["/dev/dri/card7"]);
    assert_eq!(master.shared().attached(), 2);
    assert_eq!(pools.users(master.pool()).unwrap(), 2);

    joiner.screen().init_screen().unwrap();
    let (_, output) = joiner.screen().init_output(0).unwrap();
    assert_eq!(output.resolution, Resolution::from_index(12).unwrap());

    let vga = OutputConfig {
        flags: OutputConfigFlags::RESOLUTION,
        resolution: Resolution::from_index(0).unwrap(),
    };
    joiner.screen().set_output_config(0, &vga).unwrap();
    assert_eq!(master.screen().screen_size().unwrap(), Dimension::new(640, 480));

    joiner.leave(&pools).unwrap();
    master.shutdown(&pools).unwrap();
}

#[test]
fn test_leave_keeps_state_and_shutdown_frees_it() {
    let arena = test_arena("teardown");
    let pools = ArenaSurfacePools::new(&arena);
    let config = test_config();
    let core = Core::new(&arena, &pools, &config);
    let master_binder = MockBinder::new(1280, 720);
    let joiner_binder = MockBinder::new(1280, 720);

    let master = System::initialize(&core, &master_binder).unwrap();
    let pool = master.pool();
    let joiner = System::join(&core, &joiner_binder).unwrap();

    joiner.leave(&pools).unwrap();
    assert_eq!(joiner_binder.stats.dropped.get(), 1);
    assert!(arena.contains("egl"));
    assert_eq!(master.shared().attached(), 1);
    assert_eq!(pools.users(pool).unwrap(), 1);

    master.shutdown(&pools).unwrap();
    assert_eq!(master_binder.stats.dropped.get(), 1);
    assert!(!arena.contains("egl"));
    assert!(matches!(pools.users(pool), Err(Error::SurfacePool(_))));
}

#[test]
fn test_second_master_fails_to_publish() {
    let arena = test_arena("second-master");
    let pools = ArenaSurfacePools::new(&arena);
    let config = test_config();
    let core = Core::new(&arena, &pools, &config);
    let first_binder = MockBinder::new(1920, 1080);
    let second_binder = MockBinder::new(1920, 1080);

    let first = System::initialize(&core, &first_binder).unwrap();
    let second = System::initialize(&core, &second_binder);

    assert!(matches!(second, Err(Error::Shared { .. })));
    assert_eq!(second_binder.stats.dropped.get(), 1);
    assert!(!arena.contains("pool-2"));
    // the first master's state is untouched
    assert!(arena.contains("egl"));
    assert_eq!(first.shared().attached(), 1);
    assert!(!arena_entries(&arena).iter().any(|name| name.ends_with(".tmp")));

    first.shutdown(&pools).unwrap();
}

/// Rewrite the master pid of the published state as a pid no process has
fn mark_master_exited(arena: &Arena) {
    let file = std::fs::OpenOptions::new()
        .write(true)
        .open(arena.dir().join("egl"))
        .unwrap();
    // owner follows the magic word
    file.write_all_at(&(i32::MAX as u32).to_ne_bytes(), 4).unwrap();
}

#[test]
fn test_exited_master_state_is_reclaimed() {
    let arena = test_arena("exited-master");
    let pools = ArenaSurfacePools::new(&arena);
    let config = test_config();
    let core = Core::new(&arena, &pools, &config);
    let crashed_binder = MockBinder::new(1920, 1080);
    let joiner_binder = MockBinder::new(1920, 1080);
    let next_binder = MockBinder::new(1280, 720);

    let crashed = System::initialize(&core, &crashed_binder).unwrap();
    let stale_pool = crashed.pool();
    std::mem::forget(crashed);
    mark_master_exited(&arena);

    assert!(matches!(
        System::join(&core, &joiner_binder),
        Err(Error::NotFound(_))
    ));
    assert!(joiner_binder.stats.binds.borrow().is_empty());

    let next = System::initialize(&core, &next_binder).unwrap();
    assert_ne!(next.pool(), stale_pool);
    assert!(matches!(pools.users(stale_pool), Err(Error::SurfacePool(_))));
    assert_eq!(next.shared().owner(), std::process::id());

    let joiner = System::join(&core, &joiner_binder).unwrap();
    assert_eq!(next.shared().attached(), 2);
    joiner.leave(&pools).unwrap();

    next.shutdown(&pools).unwrap();
    assert_eq!(arena_entries(&arena), ["pool-ids"]);
}

#[test]
fn test_panel_orientation_rotates_logical_mode() {
    let arena = test_arena("rotation");
    let pools = ArenaSurfacePools::new(&arena);
    let config = test_config();
    let core = Core::new(&arena, &pools, &config);
    let mut binder = MockBinder::new(1080, 1920);
    binder.orientation = Some(PanelOrientation::RightSideUp);

    let mut system = System::initialize(&core, &binder).unwrap();
    let mut screen = system.screen();
    screen.init_screen().unwrap();

    assert_eq!(screen.screen_rotation().unwrap(), Rotation::Deg90);
    assert_eq!(screen.screen_size().unwrap(), Dimension::new(1920, 607));

    system.shutdown(&pools).unwrap();
}

#[test]
fn test_configured_rotation_wins() {
    let arena = test_arena("rotation-config");
    let pools = ArenaSurfacePools::new(&arena);
    let mut config = test_config();
    config.layer.rotation = Some(Rotation::Deg180);
    config.mode.width = Some(1280);
    config.mode.height = Some(720);
    let core = Core::new(&arena, &pools, &config);
    let mut binder = MockBinder::new(1920, 1080);
    binder.orientation = Some(PanelOrientation::LeftSideUp);

    let mut system = System::initialize(&core, &binder).unwrap();
    let mut screen = system.screen();
    screen.init_screen().unwrap();

    assert_eq!(screen.screen_rotation().unwrap(), Rotation::Deg180);
    assert_eq!(screen.screen_size().unwrap(), Dimension::new(1280, 720));

    system.shutdown(&pools).unwrap();
}

#[test]
fn test_invalid_output_config_keeps_mode() {
    let arena = test_arena("output-config");
    let pools = ArenaSurfacePools::new(&arena);
    let config = test_config();
    let core = Core::new(&arena, &pools, &config);
    let binder = MockBinder::new(1920, 1080);

    let mut system = System::initialize(&core, &binder).unwrap();
    let mut screen = system.screen();
    screen.init_screen().unwrap();

    let rejected = [
        (
            0,
            OutputConfig {
                flags: OutputConfigFlags::RESOLUTION | OutputConfigFlags::SIGNALS,
                resolution: Resolution::from_index(0).unwrap(),
            },
        ),
        (
            0,
            OutputConfig {
                flags: OutputConfigFlags::RESOLUTION,
                resolution: Resolution::from_bits(0b11),
            },
        ),
        (
            0,
            OutputConfig {
                flags: OutputConfigFlags::RESOLUTION,
                resolution: Resolution::from_bits(1 << 23),
            },
        ),
        (
            0,
            OutputConfig {
                flags: OutputConfigFlags::RESOLUTION,
                resolution: Resolution::UNKNOWN,
            },
        ),
        (
            1,
            OutputConfig {
                flags: OutputConfigFlags::RESOLUTION,
                resolution: Resolution::from_index(0).unwrap(),
            },
        ),
    ];

    for (output, config) in &rejected {
        assert!(matches!(
            screen.set_output_config(*output, config),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(screen.screen_size().unwrap(), Dimension::new(1920, 1080));
    }
    assert!(matches!(screen.init_output(1), Err(Error::InvalidArgument(_))));

    system.shutdown(&pools).unwrap();
}

#[test]
fn test_region_failure_masks() {
    let arena = test_arena("test-region");
    let pools = ArenaSurfacePools::new(&arena);
    let config = test_config();
    let core = Core::new(&arena, &pools, &config);
    let binder = MockBinder::new(1024, 768);

    let mut system = System::initialize(&core, &binder).unwrap();
    system.screen().init_screen().unwrap();
    let mut layer = system.primary_layer();
    let (description, layer_config) = layer.init_layer().unwrap();
    assert_eq!(description.name, "EGL Primary Layer");
    assert_eq!((layer_config.width, layer_config.height), (1024, 768));
    assert_eq!(layer_config.pixelformat, PixelFormat::Argb);

    let mut region = layer_config.region_config();
    assert!(layer.test_region(&region).is_ok());

    region.format = PixelFormat::Rgb16;
    region.buffermode = BufferMode::Triple;
    assert!(layer.test_region(&region).is_ok());

    region.format = PixelFormat::Yuy2;
    region.buffermode = BufferMode::Windows;
    region.options = LayerOptions::all();
    match layer.test_region(&region) {
        Err(Error::Unsupported(failed)) => assert_eq!(
            failed,
            RegionConfigFlags::FORMAT | RegionConfigFlags::BUFFERMODE | RegionConfigFlags::OPTIONS
        ),
        other => panic!("unexpected result {:?}", other),
    }

    region.options = LayerOptions::empty();
    region.buffermode = BufferMode::FrontOnly;
    assert!(matches!(
        layer.test_region(&region),
        Err(Error::Unsupported(failed)) if failed == RegionConfigFlags::FORMAT
    ));

    system.shutdown(&pools).unwrap();
}

#[test]
fn test_update_region_presents_and_caches() {
    let arena = test_arena("update-region");
    let pools = ArenaSurfacePools::new(&arena);
    let config = test_config();
    let core = Core::new(&arena, &pools, &config);
    let binder = MockBinder::new(800, 600);
    let size = Dimension::new(800, 600);

    let mut system = System::initialize(&core, &binder).unwrap();
    let mut layer = system.primary_layer();

    // outside the surface: nothing happens
    layer
        .update_region(size, Some(&Region::new(900, 0, 1000, 100)))
        .unwrap();
    assert_eq!(binder.stats.swaps.get(), 0);

    layer.update_region(size, None).unwrap();
    layer
        .update_region(size, Some(&Region::new(10, 10, 20, 20)))
        .unwrap();

    assert_eq!(binder.stats.swaps.get(), 2);
    assert_eq!(binder.stats.registrations.get(), 1);
    assert_eq!(binder.stats.crtc_sets.get(), 1);
    assert_eq!(binder.stats.flips.get(), 2);
    assert_eq!(binder.stats.released.get(), 2);
    assert_eq!(system.scanout().presented_frames(), 2);

    system.shutdown(&pools).unwrap();
}

#[test]
fn test_crtc_failure_is_fatal() {
    let arena = test_arena("fatal");
    let pools = ArenaSurfacePools::new(&arena);
    let config = test_config();
    let core = Core::new(&arena, &pools, &config);
    let mut binder = MockBinder::new(800, 600);
    binder.fail_crtc = true;
    let size = Dimension::new(800, 600);

    let mut system = System::initialize(&core, &binder).unwrap();
    let mut layer = system.primary_layer();

    assert!(matches!(
        layer.update_region(size, None),
        Err(Error::FatalDisplay(_))
    ));
    assert!(matches!(
        layer.update_region(size, None),
        Err(Error::FatalDisplay(_))
    ));
    assert_eq!(binder.stats.swaps.get(), 1);
    assert_eq!(binder.stats.released.get(), 1);

    system.shutdown(&pools).unwrap();
}

#[test]
fn test_system_info() {
    let info = eglgbm::info();
    assert_eq!(info.name, "EGL");
    assert_eq!(info.version, (0, 1));
}
