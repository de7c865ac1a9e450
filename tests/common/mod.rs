//! Common utilities for render graph integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use rstest::fixture;

use render_graph_resources::backend::types::*;
use render_graph_resources::render_graph::{
    PassBuilder, PassExecuteContext, RenderPass, ResourceView,
};
use render_graph_resources::{DummyDevice, GraphConfig, RenderGraph, ResourceId, ResourceType};

/// Initialize logging once per test binary.
pub fn init_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Trace)
        .try_init();
}

// ============================================================================
// Fixtures
// ============================================================================

#[fixture]
pub fn device() -> DummyDevice {
    init_logger();
    DummyDevice::new()
}

/// Create a graph on `device` with the given configuration.
pub fn new_graph(device: &mut DummyDevice, config: GraphConfig) -> RenderGraph {
    RenderGraph::new(device, config).expect("failed to create render graph pools")
}

pub fn color_desc() -> TextureDescriptor {
    TextureDescriptor::new_2d(
        64,
        64,
        TextureFormat::Rgba8Unorm,
        TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
    )
    .with_label("color")
    .with_initial_state(ResourceState::RENDER_TARGET)
}

pub fn depth_desc() -> TextureDescriptor {
    TextureDescriptor::new_2d(
        64,
        64,
        TextureFormat::Depth32Float,
        TextureUsage::DEPTH_STENCIL | TextureUsage::TEXTURE_BINDING,
    )
    .with_label("depth")
    .with_initial_state(ResourceState::DEPTH_WRITE)
}

// ============================================================================
// Test passes
// ============================================================================

/// What a [`TestPass`] saw while executing.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedPass {
    pub name: String,
    pub depth: u32,
    pub resolved: Vec<(ResourceId, Option<GpuResource>)>,
}

pub type ExecutionLog = Arc<Mutex<Vec<ExecutedPass>>>;

type SetupFn = Box<dyn FnMut(&mut PassBuilder) -> Vec<ResourceView> + Send + Sync>;

/// Pass whose setup is a closure; on execute it resolves every view it
/// declared and appends the result to its log.
pub struct TestPass {
    name: String,
    setup: SetupFn,
    views: Vec<ResourceView>,
    log: Option<ExecutionLog>,
}

impl TestPass {
    pub fn logging(mut self, log: &ExecutionLog) -> Self {
        self.log = Some(log.clone());
        self
    }
}

/// Create a [`TestPass`].
pub fn pass(
    name: &str,
    setup: impl FnMut(&mut PassBuilder) -> Vec<ResourceView> + Send + Sync + 'static,
) -> TestPass {
    TestPass {
        name: name.to_string(),
        setup: Box::new(setup),
        views: Vec::new(),
        log: None,
    }
}

impl RenderPass for TestPass {
    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&mut self, builder: &mut PassBuilder) {
        self.views = (self.setup)(builder);
    }

    fn execute(&self, ctx: &mut PassExecuteContext) {
        assert!(ctx.device::<DummyDevice>().is_some());
        for view in &self.views {
            let typed = match view.resource_type {
                ResourceType::Texture => ctx.texture(view).map(GpuResource::Texture),
                ResourceType::Buffer => ctx.buffer(view).map(GpuResource::Buffer),
            };
            assert_eq!(typed, ctx.resolve(&view.id));
        }

        let resolved = self
            .views
            .iter()
            .map(|view| (view.id.clone(), ctx.resolve(&view.id)))
            .collect();
        if let Some(log) = &self.log {
            log.lock().push(ExecutedPass {
                name: self.name.clone(),
                depth: ctx.depth,
                resolved,
            });
        }
    }
}
