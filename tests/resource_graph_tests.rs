//! Integration tests for the render graph resource manager.
//!
//! Every test drives a full frame cycle (declare → build → execute → clear)
//! against the in-memory [`DummyDevice`], which records allocations, frees
//! and barriers so the graph's decisions can be checked exactly.

mod common;

use std::sync::Arc;

use rstest::rstest;

use common::{color_desc, depth_desc, device, new_graph, pass, ExecutionLog};
use render_graph_resources::backend::traits::BackendError;
use render_graph_resources::backend::types::*;
use render_graph_resources::render_graph::{
    GarbageBin, Lifetime, ResourceTransition, ResourceVariantKind,
};
use render_graph_resources::{
    DummyDevice, GraphConfig, GraphError, RenderGraph, ResourceId, ResourceRegistry, ResourceType,
    DEFAULT_POOL_SIZE,
};

fn id(name: &str) -> ResourceId {
    ResourceId::from(name)
}

// ============================================================================
// Alias chains
// ============================================================================

/// Root of a three-link alias chain, either graph-owned or imported.
#[derive(Debug, Clone, Copy)]
enum Root {
    Declared,
    Imported,
}

#[rstest]
#[case::declared(Root::Declared)]
#[case::imported(Root::Imported)]
fn test_alias_chain_resolves_to_root(mut device: DummyDevice, #[case] root: Root) {
    let mut graph = new_graph(&mut device, GraphConfig::default());
    let surface = device.create_external_texture();
    if let Root::Imported = root {
        graph.import_texture(
            "A",
            surface,
            ResourceState::RENDER_TARGET,
            ResourceState::RENDER_TARGET,
        );
    }

    let log = ExecutionLog::default();
    graph.add_pass(
        pass("P0", move |b| {
            let a = match root {
                Root::Declared => b.declare_texture("A", color_desc()),
                Root::Imported => id("A"),
            };
            vec![b.write_resource(&a, ResourceState::RENDER_TARGET)]
        })
        .logging(&log),
    );
    graph.add_pass(
        pass("P1", |b| {
            let bb = b.alias_resource("B", &id("A"), ResourceType::Texture);
            vec![b.write_resource(&bb, ResourceState::RENDER_TARGET)]
        })
        .logging(&log),
    );
    graph.add_pass(
        pass("P2", |b| {
            let c = b.alias_resource("C", &id("B"), ResourceType::Texture);
            vec![b.write_resource(&c, ResourceState::RENDER_TARGET)]
        })
        .logging(&log),
    );

    graph.build(&mut device).unwrap();

    assert_eq!(graph.registry().original_of(&id("C")), &id("A"));
    assert_eq!(graph.registry().variant_kind(&id("C")), ResourceVariantKind::Aliased);
    let a_backing = graph.resolve(&id("A"));
    assert!(a_backing.is_some());
    assert_eq!(graph.resolve(&id("C")), a_backing);
    if let Root::Imported = root {
        assert_eq!(a_backing, Some(GpuResource::Texture(surface)));
    }

    let cmd = device.create_command_list();
    graph.execute(&mut device, cmd).unwrap();

    let executed = log.lock().clone();
    assert_eq!(executed.len(), 3);
    for (depth, entry) in executed.iter().enumerate() {
        assert_eq!(entry.depth, depth as u32);
        assert_eq!(entry.resolved[0].1, a_backing);
    }
}

#[rstest]
fn test_alias_observes_swapped_import(mut device: DummyDevice) {
    let mut graph = new_graph(&mut device, GraphConfig::default());
    let first = device.create_external_texture();
    let second = device.create_external_texture();
    let a = graph.import_texture("A", first, ResourceState::PRESENT, ResourceState::PRESENT);

    graph.add_pass(pass("P0", |b| {
        vec![b.write_resource(&id("A"), ResourceState::RENDER_TARGET)]
    }));
    graph.add_pass(pass("P1", |b| {
        let bb = b.alias_resource("B", &id("A"), ResourceType::Texture);
        let c = b.alias_resource("C", &bb, ResourceType::Texture);
        vec![b.read_resource(&c, ResourceState::SHADER_READ)]
    }));
    graph.build(&mut device).unwrap();
    assert_eq!(graph.resolve(&id("C")), Some(GpuResource::Texture(first)));

    // Swapped after alias creation and after the build.
    graph.change_imported_texture(&a, second);
    assert_eq!(graph.resolve(&id("C")), Some(GpuResource::Texture(second)));

    let cmd = device.create_command_list();
    graph.execute(&mut device, cmd).unwrap();
    for barrier in device.recorded_barriers() {
        let GpuBarrier::Transition { resource, .. } = barrier;
        assert_eq!(resource, GpuResource::Texture(second));
    }
}

#[rstest]
#[should_panic(expected = "already been aliased")]
fn test_second_alias_of_same_parent_panics(mut device: DummyDevice) {
    let mut graph = new_graph(&mut device, GraphConfig::default());
    graph.add_pass(pass("P0", |b| {
        let a = b.declare_texture("A", color_desc());
        vec![b.write_resource(&a, ResourceState::RENDER_TARGET)]
    }));
    graph.add_pass(pass("P1", |b| {
        b.alias_resource("X", &id("A"), ResourceType::Texture);
        b.alias_resource("Y", &id("A"), ResourceType::Texture);
        Vec::new()
    }));
}

#[rstest]
#[should_panic(expected = "already exists")]
fn test_duplicate_declaration_panics(mut device: DummyDevice) {
    let mut graph = new_graph(&mut device, GraphConfig::default());
    graph.add_pass(pass("P0", |b| {
        b.declare_texture("A", color_desc());
        Vec::new()
    }));
    graph.add_pass(pass("P1", |b| {
        b.declare_buffer("A", BufferDescriptor::new(16, BufferUsage::STORAGE));
        Vec::new()
    }));
}

#[rstest]
#[should_panic(expected = "does not exist")]
fn test_unknown_resource_panics(mut device: DummyDevice) {
    let mut graph = new_graph(&mut device, GraphConfig::default());
    graph.add_pass(pass("P0", |b| {
        vec![b.read_resource(&id("Missing"), ResourceState::SHADER_READ)]
    }));
}

// ============================================================================
// Lifetimes
// ============================================================================

#[rstest]
#[case::as_specified(&[2, 5, 1])]
#[case::ascending(&[1, 2, 5])]
#[case::descending(&[5, 2, 1])]
#[case::repeated(&[5, 1, 1, 2, 5])]
fn test_usage_lifetime_widening(#[case] depths: &[u32]) {
    let mut registry = ResourceRegistry::new();
    let a = registry.declare_texture("A", color_desc());
    for &depth in depths {
        registry.resolve_lifetime(&a, depth);
    }
    assert_eq!(registry.usage_lifetime(&a), Lifetime::new(1, 5));
    assert_eq!(registry.resource_lifetime(&a), Lifetime::new(1, 5));
}

#[rstest]
#[case::after_parent(4, true)]
#[case::boundary(3, true)]
#[case::overlapping(2, false)]
fn test_alias_overlap_boundary(#[case] alias_depth: u32, #[case] passes: bool) {
    let mut registry = ResourceRegistry::new();
    let a = registry.declare_texture("A", color_desc());
    registry.resolve_lifetime(&a, 0);
    registry.resolve_lifetime(&a, 3);
    let b = registry.alias("B", &a, ResourceType::Texture);
    registry.resolve_lifetime(&b, alias_depth);

    let result = registry.sanitize_aliasing_lifetimes();
    assert_eq!(result.is_ok(), passes);
    if !passes {
        assert_eq!(
            result,
            Err(GraphError::AliasingLifetimeOverlap {
                alias: b,
                parent: a,
                parent_end: 3,
                alias_start: alias_depth,
            })
        );
    }
}

#[rstest]
fn test_overlapping_alias_refuses_to_execute(mut device: DummyDevice) {
    let mut graph = new_graph(&mut device, GraphConfig::default());
    graph.add_pass(pass("P0", |b| {
        let a = b.declare_texture("A", color_desc());
        vec![b.write_resource(&a, ResourceState::RENDER_TARGET)]
    }));
    graph.add_pass(pass("P1", |b| {
        let bb = b.alias_resource("B", &id("A"), ResourceType::Texture);
        vec![b.write_resource(&bb, ResourceState::RENDER_TARGET)]
    }));
    // Reads A after its memory was handed to B.
    graph.add_pass(pass("P2", |b| {
        vec![b.read_resource(&id("A"), ResourceState::SHADER_READ)]
    }));

    let err = graph.build(&mut device).unwrap_err();
    assert!(matches!(
        err,
        GraphError::AliasingLifetimeOverlap {
            parent_end: 2,
            alias_start: 1,
            ..
        }
    ));
    assert!(graph.compiled().is_none());

    let cmd = device.create_command_list();
    assert_eq!(graph.execute(&mut device, cmd), Err(GraphError::NotBuilt));
    assert!(device.barrier_batches().is_empty());
}

#[rstest]
fn test_unused_middle_alias_does_not_hide_overlap(mut device: DummyDevice) {
    let mut graph = new_graph(&mut device, GraphConfig::default());
    graph.add_pass(pass("P0", |b| {
        let a = b.declare_texture("A", color_desc());
        let bb = b.alias_resource("B", &a, ResourceType::Texture);
        b.alias_resource("C", &bb, ResourceType::Texture);
        vec![b.write_resource(&a, ResourceState::RENDER_TARGET)]
    }));
    // B is never touched; C starts while A is still live.
    graph.add_pass(pass("P1", |b| {
        vec![b.write_resource(&id("C"), ResourceState::RENDER_TARGET)]
    }));
    graph.add_pass(pass("P2", |b| {
        vec![b.read_resource(&id("A"), ResourceState::SHADER_READ)]
    }));

    assert_eq!(graph.registry().usage_lifetime(&id("B")), Lifetime::UNBOUNDED);
    assert_eq!(
        graph.build(&mut device),
        Err(GraphError::AliasingLifetimeOverlap {
            alias: id("C"),
            parent: id("A"),
            parent_end: 2,
            alias_start: 1,
        })
    );
    assert!(graph.compiled().is_none());
}

// ============================================================================
// Transitions
// ============================================================================

#[rstest]
fn test_depth_prepass_scenario(mut device: DummyDevice) {
    let mut graph = new_graph(&mut device, GraphConfig::default());
    let p0 = graph.add_pass(pass("P0", |b| {
        let depth = b.declare_texture("Depth", depth_desc());
        vec![b.write_resource(&depth, ResourceState::DEPTH_WRITE)]
    }));
    let p1 = graph.add_pass(pass("P1", |b| {
        vec![b.read_resource(&id("Depth"), ResourceState::SHADER_READ)]
    }));

    graph.build(&mut device).unwrap();

    let compiled = graph.compiled().unwrap();
    assert!(compiled.prologue().is_empty());
    assert!(compiled.pass_barriers(p0).is_empty());
    assert_eq!(
        compiled.pass_barriers(p1),
        &[ResourceTransition {
            id: id("Depth"),
            before: ResourceState::DEPTH_WRITE,
            after: ResourceState::SHADER_READ,
        }]
    );
    assert_eq!(
        graph.registry().current_state(&id("Depth")),
        ResourceState::SHADER_READ
    );

    let depth = graph.resolve(&id("Depth")).unwrap();
    let cmd = device.create_command_list();
    graph.execute(&mut device, cmd).unwrap();
    assert_eq!(
        device.barrier_batches(),
        &[(
            cmd,
            vec![GpuBarrier::transition(
                depth,
                ResourceState::DEPTH_WRITE,
                ResourceState::SHADER_READ
            )]
        )]
    );
}

#[rstest]
fn test_imported_round_trip(mut device: DummyDevice) {
    let mut graph = new_graph(&mut device, GraphConfig::default());
    let surface = device.create_external_texture();
    let s0 = ResourceState::COMMON;
    let s1 = ResourceState::PRESENT;
    let imported = graph.import_texture("Surface", surface, s0, s1);
    let expected = vec![GpuBarrier::transition(GpuResource::Texture(surface), s0, s1)];

    for _frame in 0..2 {
        graph.build(&mut device).unwrap();
        assert_eq!(graph.registry().current_state(&imported), s0);

        let cmd = device.create_command_list();
        graph.execute(&mut device, cmd).unwrap();
        assert_eq!(device.recorded_barriers(), expected);
        assert_eq!(graph.registry().current_state(&imported), s0);

        graph.clear();
        assert!(graph.registry().contains(&imported));
        device.clear_barrier_log();
    }
}

#[rstest]
fn test_imported_written_then_handed_back(mut device: DummyDevice) {
    let mut graph = new_graph(&mut device, GraphConfig::default());
    let backbuffer = device.create_external_texture();
    graph.import_texture(
        "Backbuffer",
        backbuffer,
        ResourceState::PRESENT,
        ResourceState::PRESENT,
    );
    graph.add_pass(pass("Composite", |b| {
        vec![b.write_resource(&id("Backbuffer"), ResourceState::RENDER_TARGET)]
    }));

    graph.build(&mut device).unwrap();
    let cmd = device.create_command_list();
    graph.execute(&mut device, cmd).unwrap();

    let resource = GpuResource::Texture(backbuffer);
    assert_eq!(
        device.recorded_barriers(),
        vec![
            GpuBarrier::transition(resource, ResourceState::PRESENT, ResourceState::RENDER_TARGET),
            GpuBarrier::transition(resource, ResourceState::RENDER_TARGET, ResourceState::PRESENT),
        ]
    );
}

#[rstest]
fn test_imported_entry_state_restored_silently(mut device: DummyDevice) {
    let mut graph = new_graph(&mut device, GraphConfig::default());
    let buffer = device.create_external_buffer();
    graph.import_buffer(
        "Readback",
        buffer,
        ResourceState::COPY_DEST,
        ResourceState::COPY_DEST,
    );
    let p0 = graph.add_pass(pass("Resolve", |b| {
        vec![b.write_resource(&id("Readback"), ResourceState::UNORDERED_ACCESS)]
    }));

    // The second build starts from the entry state again, without a
    // prologue barrier, even though the first build was never executed.
    graph.build(&mut device).unwrap();
    graph.build(&mut device).unwrap();
    let compiled = graph.compiled().unwrap();
    assert!(compiled.prologue().is_empty());
    assert_eq!(
        compiled.pass_barriers(p0),
        &[ResourceTransition {
            id: id("Readback"),
            before: ResourceState::COPY_DEST,
            after: ResourceState::UNORDERED_ACCESS,
        }]
    );
}

#[rstest]
fn test_rebuild_resets_declared_to_init(mut device: DummyDevice) {
    let mut graph = new_graph(&mut device, GraphConfig::default());
    graph.add_pass(pass("P0", |b| {
        let depth = b.declare_texture("Depth", depth_desc());
        vec![b.write_resource(&depth, ResourceState::DEPTH_WRITE)]
    }));
    let p1 = graph.add_pass(pass("P1", |b| {
        vec![b.read_resource(&id("Depth"), ResourceState::SHADER_READ)]
    }));

    let cmd = device.create_command_list();
    graph.build(&mut device).unwrap();
    graph.execute(&mut device, cmd).unwrap();
    graph.build(&mut device).unwrap();

    let compiled = graph.compiled().unwrap();
    assert_eq!(
        compiled.prologue(),
        &[ResourceTransition {
            id: id("Depth"),
            before: ResourceState::SHADER_READ,
            after: ResourceState::DEPTH_WRITE,
        }]
    );
    assert_eq!(compiled.pass_barriers(p1).len(), 1);
    // Realized once, kept across builds.
    assert_eq!(device.live_textures().len(), 1);
}

// ============================================================================
// Frame boundary
// ============================================================================

#[rstest]
fn test_clear_discards_declared_keeps_imported(mut device: DummyDevice) {
    let mut graph = new_graph(&mut device, GraphConfig::default());
    let surface = device.create_external_texture();
    graph.import_texture("I", surface, ResourceState::PRESENT, ResourceState::PRESENT);
    graph.add_pass(pass("P0", |b| {
        let d = b.declare_texture("D", color_desc());
        vec![
            b.write_resource(&d, ResourceState::RENDER_TARGET),
            b.write_resource(&id("I"), ResourceState::RENDER_TARGET),
        ]
    }));
    graph.add_pass(pass("P1", |b| {
        b.declare_proxy("Later");
        let alias = b.alias_resource("IAlias", &id("I"), ResourceType::Texture);
        vec![b.read_resource(&alias, ResourceState::SHADER_READ)]
    }));
    graph.build(&mut device).unwrap();
    let cmd = device.create_command_list();
    graph.execute(&mut device, cmd).unwrap();

    graph.clear();

    let registry = graph.registry();
    assert!(registry.lookup(&id("D")).is_none());
    assert!(registry.lookup(&id("IAlias")).is_none());
    assert!(registry.lookup(&id("Later")).is_none());
    assert_eq!(registry.len(), 1);

    let imported = registry.lookup(&id("I")).unwrap();
    assert_eq!(imported.kind(), ResourceVariantKind::Imported);
    assert!(!imported.has_been_aliased());
    assert_eq!(imported.usage_lifetime(), Lifetime::UNBOUNDED);
    assert_eq!(registry.resource_lifetime(&id("I")), Lifetime::UNBOUNDED);
    assert_eq!(graph.pass_count(), 0);

    // The import can be aliased again next frame.
    graph.add_pass(pass("P0", |b| {
        let alias = b.alias_resource("IAlias", &id("I"), ResourceType::Texture);
        vec![b.write_resource(&alias, ResourceState::RENDER_TARGET)]
    }));
    graph.build(&mut device).unwrap();
}

#[rstest]
fn test_free_imported(mut device: DummyDevice) {
    let mut graph = new_graph(&mut device, GraphConfig::default());
    let surface = device.create_external_texture();
    let i = graph.import_texture("I", surface, ResourceState::PRESENT, ResourceState::PRESENT);

    graph.free_imported(&i);
    assert!(!graph.registry().contains(&i));
    // The graph never frees what it does not own.
    assert!(device.freed_textures().is_empty());
}

#[rstest]
fn test_free_imported_takes_its_aliases(mut device: DummyDevice) {
    let mut graph = new_graph(&mut device, GraphConfig::default());
    let surface = device.create_external_texture();
    let i = graph.import_texture("I", surface, ResourceState::PRESENT, ResourceState::PRESENT);
    graph.add_pass(pass("P0", |b| {
        b.alias_resource("IAlias", &id("I"), ResourceType::Texture);
        let d = b.declare_texture("D", color_desc());
        vec![b.write_resource(&d, ResourceState::RENDER_TARGET)]
    }));

    graph.free_imported(&i);
    assert!(graph.registry().lookup(&id("IAlias")).is_none());
    assert_eq!(graph.registry().len(), 1);

    graph.build(&mut device).unwrap();
    assert!(graph.resolve(&id("D")).is_some());
    assert!(device.freed_textures().is_empty());
}

#[rstest]
#[case::one_frame(1)]
#[case::two_frames(2)]
#[case::three_frames(3)]
fn test_garbage_bin_horizon(mut device: DummyDevice, #[case] frames_in_flight: u64) {
    let config = GraphConfig::default().with_frames_in_flight(frames_in_flight);
    let mut graph = new_graph(&mut device, config);
    graph.add_pass(pass("P0", |b| {
        let d = b.declare_buffer("Scratch", BufferDescriptor::new(256, BufferUsage::STORAGE));
        vec![b.write_resource(&d, ResourceState::UNORDERED_ACCESS)]
    }));
    graph.build(&mut device).unwrap();
    let cmd = device.create_command_list();
    graph.execute(&mut device, cmd).unwrap();
    let Some(GpuResource::Buffer(scratch)) = graph.resolve(&id("Scratch")) else {
        panic!("scratch buffer was not realized");
    };

    graph.clear();
    for _ in 1..frames_in_flight {
        graph.garbage_bin().advance_frame(&mut device);
        assert!(device.live_buffers().contains(&scratch));
    }
    graph.garbage_bin().advance_frame(&mut device);
    assert_eq!(device.freed_buffers(), &[scratch]);
    assert_eq!(graph.garbage_bin().pending_count(), 0);
}

#[rstest]
fn test_shared_garbage_bin(mut device: DummyDevice) {
    let bin = Arc::new(GarbageBin::new(1));
    let mut first =
        RenderGraph::with_garbage_bin(&mut device, GraphConfig::default(), bin.clone()).unwrap();
    let mut second =
        RenderGraph::with_garbage_bin(&mut device, GraphConfig::default(), bin.clone()).unwrap();

    for graph in [&mut first, &mut second] {
        graph.add_pass(pass("P0", |b| {
            let d = b.declare_texture("Color", color_desc());
            vec![b.write_resource(&d, ResourceState::RENDER_TARGET)]
        }));
        graph.build(&mut device).unwrap();
        graph.clear();
    }

    assert_eq!(first.garbage_bin().frames_in_flight(), 1);
    assert_eq!(bin.pending_count(), 2);
    assert_eq!(bin.advance_frame(&mut device), 2);
    assert!(device.live_textures().is_empty());
}

// ============================================================================
// Allocation
// ============================================================================

#[rstest]
fn test_pool_exhaustion_is_fatal(mut device: DummyDevice) {
    let config = GraphConfig::default().with_buffer_pool_size(128);
    let mut graph = new_graph(&mut device, config);
    graph.add_pass(pass("P0", |b| {
        let d = b.declare_buffer("Huge", BufferDescriptor::new(4096, BufferUsage::STORAGE));
        vec![b.write_resource(&d, ResourceState::UNORDERED_ACCESS)]
    }));

    let err = graph.build(&mut device).unwrap_err();
    assert_eq!(
        err,
        GraphError::Backend(BackendError::PoolExhausted {
            requested: 4096,
            available: 128,
        })
    );

    let cmd = device.create_command_list();
    assert_eq!(graph.execute(&mut device, cmd), Err(GraphError::NotBuilt));
}

#[rstest]
fn test_memory_info_and_aliasing_saves_memory(mut device: DummyDevice) {
    let mut graph = new_graph(&mut device, GraphConfig::default());
    graph.add_pass(pass("GBuffer", |b| {
        let a = b.declare_texture("GBuffer", color_desc());
        vec![b.write_resource(&a, ResourceState::RENDER_TARGET)]
    }));
    graph.add_pass(pass("Bloom", |b| {
        let bloom = b.alias_resource("Bloom", &id("GBuffer"), ResourceType::Texture);
        vec![b.write_resource(&bloom, ResourceState::RENDER_TARGET)]
    }));
    graph.add_pass(pass("Lut", |b| {
        let lut_desc = BufferDescriptor::new(1024, BufferUsage::UNIFORM).with_label("lut");
        let lut = b.declare_buffer("Lut", lut_desc);
        vec![b.write_resource(&lut, ResourceState::COPY_DEST)]
    }));
    graph.build(&mut device).unwrap();

    let info = graph.memory_info(&device);
    let texture_bytes = color_desc().size_in_bytes();
    assert_eq!(info.allocated_bytes, texture_bytes + 1024);
    assert_eq!(info.block_bytes, 3 * DEFAULT_POOL_SIZE);
    assert_eq!(info.smallest_alloc, 1024);
    assert_eq!(info.largest_alloc, texture_bytes);
    assert_eq!(
        info.utilization(),
        (texture_bytes + 1024) as f32 / (3 * DEFAULT_POOL_SIZE) as f32
    );
    assert_eq!(device.live_textures().len(), 1);
}

#[rstest]
fn test_destroy_releases_everything(mut device: DummyDevice) {
    let mut graph = new_graph(&mut device, GraphConfig::default());
    graph.add_pass(pass("P0", |b| {
        let a = b.declare_texture("A", color_desc());
        vec![b.write_resource(&a, ResourceState::RENDER_TARGET)]
    }));
    graph.build(&mut device).unwrap();

    graph.destroy(&mut device);
    assert!(device.live_textures().is_empty());
    assert_eq!(device.freed_textures().len(), 1);
}
