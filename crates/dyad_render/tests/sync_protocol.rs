//! # Front/Back Sync Protocol Tests
//!
//! End-to-end runs against a live core thread on the headless backend:
//!
//! 1. **Dirty drains**: one buffer per dirty object per drain, masks OR'd
//! 2. **Apply paths**: lightweight update vs. remove/rebuild/add
//! 3. **Creation handshake**: blocking handle access, construction failure
//! 4. **Lifetimes**: teardown last, backs outlive their fronts
//!
//! Run with: cargo test -p dyad_render --test sync_protocol

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use dyad_core::CoreError;
use dyad_render::objects::{translation, IDENTITY};
use dyad_render::{
    BackObject, CoreServices, DirtyMask, Front, FrontObject, HeadlessBackend, Material,
    MaterialDesc, Mesh, MeshBack, MeshData, RecordingTracker, RenderError, RenderResult,
    RenderWindow, Renderable, SyncConfig, SyncContext, TrackerEvent, TrackerLog, WindowSettings,
};

fn start_with(config: SyncConfig) -> (SyncContext, Arc<HeadlessBackend>, TrackerLog) {
    let backend = Arc::new(HeadlessBackend::new(config.headless_memory_budget));
    let (tracker, log) = RecordingTracker::new();
    let ctx = SyncContext::start(config, backend.clone(), Box::new(tracker)).unwrap();
    (ctx, backend, log)
}

fn start() -> (SyncContext, Arc<HeadlessBackend>, TrackerLog) {
    start_with(SyncConfig::default())
}

/// A back object whose construction panics.
struct Volatile;
struct VolatileBack;

impl FrontObject for Volatile {
    type Back = VolatileBack;

    fn describe(&self) {}

    fn build_record(&self, _mask: DirtyMask) {}
}

impl BackObject for VolatileBack {
    type Desc = ();
    type Record = ();
    const KIND: &'static str = "volatile";

    fn construct(_desc: (), _core: &mut CoreServices) -> RenderResult<Self> {
        panic!("device lost during construction");
    }

    fn unpack(&mut self, _mask: DirtyMask, _record: ()) {}

    fn rebuild(&mut self, _core: &mut CoreServices) -> RenderResult<()> {
        Ok(())
    }
}

/// A mesh and a material whose backs are already constructed.
fn ready_parts(ctx: &SyncContext) -> (Mesh, Material) {
    let mesh = Mesh::with_data(ctx, MeshData::cube(1.0));
    mesh.create_back();
    let material = Material::with_desc(ctx, MaterialDesc::default());
    material.create_back();
    ctx.flush().unwrap();
    (mesh, material)
}

// ============================================================================
// DIRTY DRAINS
// ============================================================================

#[test]
fn one_buffer_per_dirty_drain_with_ored_mask() {
    let (ctx, _backend, _log) = start();
    let r = Renderable::with_parts(&ctx, None, None);
    r.create_back();
    ctx.flush().unwrap();

    r.set_transform(translation(1.0, 0.0, 0.0));
    r.set_layer(3);
    r.set_transform(translation(2.0, 0.0, 0.0));
    assert_eq!(r.pending_mask(), DirtyMask::TRANSFORM | DirtyMask::PROPERTIES);
    assert_eq!(ctx.pending_objects(), 1);

    let report = ctx.sync().unwrap();
    assert_eq!(report.buffers_built, 1);
    assert!(r.pending_mask().is_empty());

    // Nothing changed since: nothing is sent.
    let report = ctx.sync().unwrap();
    assert_eq!(report.buffers_built, 0);

    let stats = ctx.core_stats();
    assert_eq!(stats.buffers_applied, 1);
    assert_eq!(stats.structural_rebuilds, 1);
    assert_eq!(stats.batches, 1);

    let transform = r.block_until_ready().read(|b| b.transform());
    assert_eq!(transform, translation(2.0, 0.0, 0.0));
}

#[test]
fn changes_before_create_back_ride_on_the_descriptor() {
    let (ctx, _backend, _log) = start();
    let r = Renderable::with_parts(&ctx, None, None);
    r.set_transform(translation(0.0, 9.0, 0.0));
    r.set_layer(7);
    r.create_back();

    let report = ctx.sync().unwrap();
    assert_eq!(report.objects_visited, 1);
    assert_eq!(report.buffers_built, 0);

    let (transform, layer) = r
        .block_until_ready()
        .read(|b| (b.transform(), b.sort_key().layer()));
    assert_eq!(transform, translation(0.0, 9.0, 0.0));
    assert_eq!(layer, 7);
}

#[test]
fn many_objects_share_one_batch() {
    let (ctx, _backend, _log) = start();
    let objects: Vec<Renderable> = (0..100)
        .map(|_| {
            let r = Renderable::with_parts(&ctx, None, None);
            r.create_back();
            r
        })
        .collect();
    ctx.flush().unwrap();

    for (i, r) in objects.iter().enumerate() {
        r.set_transform(translation(i as f32, 0.0, 0.0));
    }
    let report = ctx.sync().unwrap();
    assert_eq!(report.buffers_built, 100);
    assert_eq!(ctx.core_stats().lightweight_updates, 100);
    assert_eq!(ctx.core_stats().batches, 1);
}

#[test]
fn batch_storage_is_recycled() {
    let (ctx, _backend, _log) = start();
    let r = Renderable::with_parts(&ctx, None, None);
    r.create_back();
    ctx.flush().unwrap();

    for i in 0..5 {
        r.set_transform(translation(i as f32, 0.0, 0.0));
        ctx.sync().unwrap();
    }
    let arena = ctx.arena_stats();
    assert!(arena.reused >= 4, "arena stats: {arena:?}");
}

// ============================================================================
// APPLY PATHS
// ============================================================================

#[test]
fn transform_only_then_everything() {
    let (ctx, _backend, log) = start();
    let (mesh, material) = ready_parts(&ctx);
    let r = Renderable::with_parts(&ctx, Some(mesh), Some(material));
    let id = r.create_back().id();
    ctx.flush().unwrap();
    assert_eq!(log.events_for(id), vec![TrackerEvent::Added(id)]);
    log.clear();

    r.set_transform(translation(0.0, 1.0, 0.0));
    ctx.sync().unwrap();
    r.mark_dirty(DirtyMask::ALL);
    ctx.sync().unwrap();

    assert_eq!(
        log.events_for(id),
        vec![
            TrackerEvent::Updated(id),
            TrackerEvent::Removed(id),
            TrackerEvent::Added(id),
        ]
    );
    let stats = ctx.core_stats();
    assert_eq!(stats.lightweight_updates, 1);
    assert_eq!(stats.structural_rebuilds, 1);
}

#[test]
fn active_toggle_is_always_remove_or_add() {
    let (ctx, _backend, log) = start();
    let r = Renderable::with_parts(&ctx, None, None);
    let id = r.create_back().id();
    ctx.flush().unwrap();
    log.clear();

    r.set_active(false);
    ctx.sync().unwrap();
    assert!(!log.is_registered(id));

    // Untracked objects get no lightweight notification.
    r.set_transform(translation(1.0, 1.0, 1.0));
    ctx.sync().unwrap();

    r.set_active(true);
    ctx.sync().unwrap();
    assert!(log.is_registered(id));

    assert_eq!(
        log.events_for(id),
        vec![TrackerEvent::Removed(id), TrackerEvent::Added(id)]
    );
}

#[test]
fn inactive_objects_are_never_added() {
    let (ctx, _backend, log) = start();
    let r = Renderable::with_parts(&ctx, None, None);
    r.set_active(false);
    let id = r.create_back().id();
    r.set_layer(2);
    ctx.sync().unwrap();
    r.set_layer(3);
    ctx.sync().unwrap();

    assert!(log.events_for(id).is_empty());
    assert_eq!(log.registered(), 0);
}

#[test]
fn applied_buffers_match_direct_construction() {
    let (ctx, backend, _log) = start();
    let (mesh, material) = ready_parts(&ctx);

    let synced = Renderable::with_parts(&ctx, None, None);
    synced.create_back();
    ctx.flush().unwrap();

    synced.set_transform(translation(1.0, 0.0, 0.0));
    ctx.drain();
    synced.set_mesh(Some(mesh.clone()));
    synced.set_layer(2);
    ctx.drain();
    synced.set_material(Some(material.clone()));
    synced.set_transform(translation(4.0, 5.0, 6.0));
    ctx.drain();
    synced.set_cast_shadows(false);
    ctx.sync().unwrap();

    let direct = Renderable::with_parts(&ctx, Some(mesh), Some(material));
    direct.set_transform(translation(4.0, 5.0, 6.0));
    direct.set_layer(2);
    direct.set_cast_shadows(false);
    direct.create_back();
    ctx.sync().unwrap();

    let observe = |r: &Renderable| {
        r.block_until_ready().read(|b| {
            (
                b.transform(),
                b.index_count(),
                b.sort_key(),
                b.instance().id(),
                b.pipeline().cloned(),
            )
        })
    };
    let a = observe(&synced);
    let b = observe(&direct);

    assert_eq!(a.0, b.0);
    assert_eq!(a.1, 36);
    assert_eq!(a.1, b.1);
    assert_eq!(a.2, b.2);
    assert_eq!(backend.read_buffer(a.3), backend.read_buffer(b.3));
    assert!(Arc::ptr_eq(&a.4.unwrap(), &b.4.unwrap()));
}

#[test]
fn pending_dependency_is_picked_up_after_remark() {
    let (ctx, _backend, _log) = start();
    let mesh = Mesh::with_data(&ctx, MeshData::cube(1.0));
    mesh.create_back();
    // The mesh may or may not be ready when the renderable is described.
    let r = Renderable::with_parts(&ctx, Some(mesh.clone()), None);
    r.create_back();

    mesh.block_until_ready();
    r.mark_dirty(DirtyMask::REFERENCES);
    ctx.sync().unwrap();

    let count = r.block_until_ready().read(|b| b.index_count());
    assert_eq!(count, 36);
}

#[test]
fn absent_references_degrade_to_defaults() {
    let (ctx, _backend, log) = start();
    let mesh = Mesh::with_data(&ctx, MeshData::quad(1.0));
    let r = Renderable::with_parts(&ctx, Some(mesh.clone()), None);
    let id = r.create_back().id();
    ctx.flush().unwrap();

    // The mesh has no back yet: drawn with nothing, still registered.
    let (count, has_pipeline) = r
        .block_until_ready()
        .read(|b| (b.index_count(), b.pipeline().is_some()));
    assert_eq!(count, 0);
    assert!(has_pipeline);
    assert!(log.is_registered(id));

    mesh.create_back();
    ctx.flush().unwrap();
    r.mark_dirty(DirtyMask::REFERENCES);
    ctx.sync().unwrap();

    let count = r.block_until_ready().read(|b| b.index_count());
    assert_eq!(count, 6);
}

#[test]
fn material_changes_reach_the_uniform_buffer() {
    let (ctx, backend, _log) = start();
    let material = Material::with_desc(&ctx, MaterialDesc::default());
    material.create_back();
    ctx.flush().unwrap();

    material.set_base_color([1.0, 0.0, 0.0, 1.0]);
    material.set_surface(0.25, 1.0);
    ctx.sync().unwrap();

    let (uniform, params) = material
        .block_until_ready()
        .read(|b| (b.uniform().id(), b.desc().params));
    assert_eq!(params.base_color, [1.0, 0.0, 0.0, 1.0]);
    assert_eq!(
        backend.read_buffer(uniform).unwrap(),
        bytemuck::bytes_of(&params).to_vec()
    );
}

#[test]
fn mesh_rebuild_replaces_buffers() {
    let (ctx, backend, _log) = start();
    let mesh = Mesh::with_data(&ctx, MeshData::quad(1.0));
    mesh.create_back();
    let old = mesh.block_until_ready().read(|b| b.vertices().id());
    assert!(backend.is_live(old));

    mesh.set_data(MeshData::cube(2.0));
    ctx.sync().unwrap();

    let (new, count, bounds) = mesh
        .block_until_ready()
        .read(|b| (b.vertices().id(), b.index_count(), b.bounds()));
    assert_ne!(old, new);
    assert!(!backend.is_live(old));
    assert_eq!(count, 36);
    assert_eq!(bounds.max, [2.0, 2.0, 2.0]);
}

#[test]
fn failed_rebuild_keeps_the_core_running() {
    let config = SyncConfig::default().with_memory_budget(4096);
    let (ctx, backend, _log) = start_with(config);
    let mesh = Mesh::with_data(&ctx, MeshData::quad(1.0));
    mesh.create_back();
    let old = mesh.block_until_ready().read(|b| b.vertices().id());

    // Far more geometry than the budget allows.
    mesh.set_data(MeshData {
        positions: vec![[0.0; 3]; 10_000],
        indices: vec![0; 3],
    });
    ctx.sync().unwrap();

    // The previous buffers stay in place.
    let current = mesh.block_until_ready().read(|b| b.vertices().id());
    assert_eq!(current, old);
    assert!(backend.is_live(old));
    assert_eq!(ctx.core_stats().structural_rebuilds, 1);

    mesh.set_data(MeshData::cube(1.0));
    ctx.sync().unwrap();
    let count = mesh.block_until_ready().read(MeshBack::index_count);
    assert_eq!(count, 36);
    assert!(!backend.is_live(old));
}

// ============================================================================
// CREATION HANDSHAKE
// ============================================================================

#[test]
fn window_handle_blocks_until_constructed() {
    let (ctx, backend, _log) = start();
    let window = RenderWindow::new(
        &ctx,
        WindowSettings {
            size: (800, 600),
            ..WindowSettings::default()
        },
    );
    window.create_back();

    let surface = window.surface_handle().unwrap();
    assert_eq!(backend.surface_size(surface), Some((800, 600)));

    let props = window.properties();
    assert_eq!((props.width, props.height), (800, 600));
    assert!(props.focused);

    // Idempotent from any number of callers.
    for _ in 0..10 {
        window.block_until_ready();
    }
    let again = window.create_back();
    assert!(again.ptr_eq(window.block_until_ready()));
}

#[test]
fn platform_resize_is_visible_through_the_snapshot() {
    let (ctx, backend, _log) = start();
    let window = RenderWindow::new(&ctx, WindowSettings::default());
    let back = window.create_back().clone();
    let surface = window.surface_handle().unwrap();

    ctx.execute(move |_core| {
        back.write(|w| w.platform_resize(1920, 1080))
            .unwrap()
            .unwrap();
    });
    ctx.flush().unwrap();

    let props = window.properties();
    assert_eq!((props.width, props.height), (1920, 1080));
    assert_eq!(backend.surface_size(surface), Some((1920, 1080)));
}

#[test]
fn simulation_resize_goes_through_sync() {
    let (ctx, backend, _log) = start();
    let window = RenderWindow::new(&ctx, WindowSettings::default());
    window.create_back();
    let surface = window.surface_handle().unwrap();

    window.set_size(1024, 768);
    window.set_title("resized");
    ctx.sync().unwrap();

    assert_eq!(backend.surface_size(surface), Some((1024, 768)));
    assert_eq!(window.properties().width, 1024);
    let title = window
        .block_until_ready()
        .read(|w| w.settings().title.clone());
    assert_eq!(title, "resized");
}

#[test]
fn title_change_keeps_the_platform_size() {
    let (ctx, backend, _log) = start();
    let window = RenderWindow::new(&ctx, WindowSettings::default());
    let back = window.create_back().clone();
    let surface = window.surface_handle().unwrap();

    ctx.execute(move |_core| {
        back.write(|w| w.platform_resize(1920, 1080))
            .unwrap()
            .unwrap();
    });
    ctx.flush().unwrap();

    window.set_title("new title");
    ctx.sync().unwrap();

    let props = window.properties();
    assert_eq!((props.width, props.height), (1920, 1080));
    assert_eq!(backend.surface_size(surface), Some((1920, 1080)));
    let (title, size) = window
        .block_until_ready()
        .read(|w| (w.settings().title.clone(), w.settings().size));
    assert_eq!(title, "new title");
    assert_eq!(size, (1920, 1080));

    // A later request from the simulation still wins.
    window.set_size(640, 480);
    ctx.sync().unwrap();
    assert_eq!(window.properties().width, 640);
}

#[test]
fn construction_failure_is_reported_at_the_gate() {
    let config = SyncConfig::default().with_memory_budget(1024);
    let (ctx, _backend, _log) = start_with(config);
    let window = RenderWindow::new(&ctx, WindowSettings::default());

    let result = window.create_back().gate().wait();
    assert!(matches!(
        result,
        Err(CoreError::ConstructionFailed { kind: "window", .. })
    ));
    assert_eq!(ctx.core_stats().construction_failures, 1);

    // Later buffers for the failed back are dropped, not applied.
    window.set_title("still here");
    ctx.sync().unwrap();
    assert_eq!(ctx.core_stats().buffers_dropped, 1);
    assert_eq!(ctx.core_stats().buffers_applied, 0);
}

#[test]
#[should_panic(expected = "construction of window failed")]
fn construction_failure_is_fatal_at_block_until_ready() {
    let config = SyncConfig::default().with_memory_budget(1024);
    let (ctx, _backend, _log) = start_with(config);
    let window = RenderWindow::new(&ctx, WindowSettings::default());
    window.create_back();
    window.block_until_ready();
}

#[test]
#[should_panic(expected = "usage error")]
fn block_until_ready_without_create_back_is_a_usage_error() {
    let (ctx, _backend, _log) = start();
    let mesh = Mesh::with_data(&ctx, MeshData::quad(1.0));
    mesh.block_until_ready();
}

#[test]
fn flush_from_the_core_thread_is_refused() {
    let (ctx, _backend, _log) = start();
    let (tx, rx) = crossbeam_channel::bounded(1);
    let inner = ctx.clone();
    ctx.execute(move |_core| {
        tx.send(inner.flush()).unwrap();
    });
    let result = rx.recv().unwrap();
    assert!(matches!(
        result,
        Err(RenderError::Core(CoreError::WrongThread { .. }))
    ));
}

#[test]
fn construction_after_shutdown_fails_the_gate() {
    let (ctx, _backend, _log) = start();
    ctx.shutdown();
    let mesh = Mesh::with_data(&ctx, MeshData::quad(1.0));
    let result = mesh.create_back().gate().wait();
    assert_eq!(result, Err(CoreError::CoreUnavailable));
}

#[test]
fn panicking_construction_fails_the_gate() {
    let (ctx, _backend, _log) = start();
    let front = Front::new(&ctx, Volatile);
    let result = front.create_back().gate().wait();
    assert!(matches!(
        result,
        Err(CoreError::ConstructionFailed { kind: "volatile", .. })
    ));
}

#[test]
fn last_context_dropped_on_a_full_queue_still_stops() {
    let config = SyncConfig {
        queue_capacity: 1,
        ..SyncConfig::default()
    };
    let (ctx, backend, _log) = start_with(config);
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
    let (queued_tx, queued_rx) = crossbeam_channel::bounded::<()>(1);

    // Holds the core thread until the queue is set up.
    ctx.execute(move |_core| {
        let _ = release_rx.recv();
    });
    // Drops the last context handle on the core thread, queue full.
    let inner = ctx.clone();
    ctx.execute(move |_core| {
        let _ = queued_rx.recv();
        drop(inner);
    });

    let filler = ctx.clone();
    drop(ctx);
    let helper = thread::spawn(move || {
        filler.execute(|_core| {});
        drop(filler);
        queued_tx.send(()).unwrap();
    });
    release_tx.send(()).unwrap();
    helper.join().unwrap();

    // The core thread releases its backend handle once it exits.
    let deadline = Instant::now() + Duration::from_secs(5);
    while Arc::strong_count(&backend) > 1 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(Arc::strong_count(&backend), 1);
}

// ============================================================================
// LIFETIMES
// ============================================================================

#[test]
fn teardown_is_the_last_command() {
    let (ctx, backend, log) = start();
    let r = Renderable::with_parts(&ctx, None, None);
    let back = r.create_back().clone();
    let id = back.id();
    ctx.flush().unwrap();

    r.set_layer(3);
    ctx.drain();
    drop(r);
    ctx.sync().unwrap();

    assert_eq!(
        log.events_for(id),
        vec![
            TrackerEvent::Added(id),
            TrackerEvent::Removed(id),
            TrackerEvent::Added(id),
            TrackerEvent::Removed(id),
        ]
    );
    assert_eq!(ctx.core_stats().teardowns, 1);

    // The handle we kept still reaches the torn-down back and its resources.
    assert!(back.is_torn_down());
    let instance = back.try_read(|b| b.instance().id()).unwrap();
    assert!(backend.is_live(instance));
    assert_eq!(back.try_read(|b| b.sort_key().layer()), Some(3));

    drop(back);
    assert!(!backend.is_live(instance));
}

#[test]
fn back_outlives_front_while_referenced() {
    let (ctx, backend, _log) = start();
    let (mesh, material) = ready_parts(&ctx);
    let mesh_back = mesh.create_back().clone();
    let vertices = mesh_back.read(|m| m.vertices().id());

    let r = Renderable::with_parts(&ctx, Some(mesh), Some(material));
    r.create_back();
    ctx.flush().unwrap();

    // Drops the last mesh front: its teardown is queued behind this change.
    r.set_mesh(None);
    assert!(!mesh_back.is_torn_down());
    ctx.sync().unwrap();

    assert!(mesh_back.is_torn_down());
    assert_eq!(r.block_until_ready().read(|b| b.index_count()), 0);
    assert!(backend.is_live(vertices));
    assert_eq!(mesh_back.strong_count(), 1);

    drop(mesh_back);
    assert!(!backend.is_live(vertices));
}

#[test]
fn dropping_the_context_stops_the_core_thread() {
    let (ctx, backend, _log) = start();
    let mesh = Mesh::with_data(&ctx, MeshData::quad(1.0));
    mesh.create_back();
    ctx.flush().unwrap();
    assert!(backend.stats().live > 0);

    // Fronts hold the context; the final drain sends the teardown.
    drop(ctx);
    drop(mesh);
    assert_eq!(backend.stats().live, 0);
}

#[test]
fn default_transform_is_identity() {
    let (ctx, _backend, _log) = start();
    let r = Renderable::with_parts(&ctx, None, None);
    assert_eq!(r.transform(), IDENTITY);
    assert!(r.is_active());
    assert!(r.back().is_none());
    drop(ctx);
}
