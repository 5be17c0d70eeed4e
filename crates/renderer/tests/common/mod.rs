//! Scripted backend, surface and hooks for driving the frame loop without a GPU.
//!
//! The backend models a single in-order queue: a submission stays pending
//! until its fence is waited on or the device is idled. Anything the frame
//! loop does that would be invalid against a real device is recorded as a
//! violation instead of failing immediately, so tests can assert on the
//! whole run.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use vkframe_platform::SurfaceEvents;
use vkframe_renderer::{Backend, FrameHooks, FrameInfo, RecordContext, TargetInfo};
use vkframe_rhi::swapchain::{AcquireOutcome, SwapchainStatus, classify_acquire, classify_present};
use vkframe_rhi::{RhiError, RhiResult, vk};

pub const IMAGE_COUNT: u32 = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    WaitFence(usize),
    ResetFence(usize),
    Acquire { image_index: Option<u32> },
    Update { slot: usize },
    BeginCommands(usize),
    BeginRenderPass(u32),
    Record,
    Overlay,
    EndRenderPass,
    EndCommands,
    Submit { cmd: usize, fence: usize },
    Present(u32),
    WaitIdle,
    CreateTargets { generation: u64, extent: vk::Extent2D },
    DropTargets(u64),
    Resize(vk::Extent2D),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FenceState {
    Signaled,
    Unsignaled,
    /// Submitted and not yet completed.
    Pending,
}

/// Non-default result of a given acquire call.
#[derive(Clone, Copy, Debug)]
pub enum AcquireScript {
    OutOfDate,
    Suboptimal,
    Error(vk::Result),
}

#[derive(Default)]
struct MockState {
    events: Vec<Event>,
    violations: Vec<String>,
    fences: Vec<FenceState>,
    semaphores: Vec<bool>,
    command_buffers: usize,
    /// Fence ids of pending submissions, oldest first.
    pending: Vec<usize>,
    max_in_flight: usize,
    /// Fence of the last submission of each command buffer.
    cmd_fence: HashMap<usize, usize>,
    acquire_calls: u32,
    present_calls: u32,
    fence_waits: u32,
    acquire_script: HashMap<u32, AcquireScript>,
    present_script: HashMap<u32, Result<bool, vk::Result>>,
    fail_fence_wait_at: Option<u32>,
    /// Remaining surface queries that report no drawable area.
    hidden_surface_queries: u32,
    surface_queries: u32,
    next_image: u32,
    generation: u64,
}

impl MockState {
    fn violation(&mut self, message: String) {
        self.violations.push(message);
    }

    fn complete_through(&mut self, fence: usize) {
        if let Some(pos) = self.pending.iter().position(|&f| f == fence) {
            for done in self.pending.drain(..=pos) {
                self.fences[done] = FenceState::Signaled;
            }
        }
    }
}

pub struct MockFence(pub usize);
pub struct MockSemaphore(pub usize);
pub struct MockCommandBuffer(pub usize);

pub struct MockTargets {
    pub generation: u64,
    extent: vk::Extent2D,
    state: Arc<Mutex<MockState>>,
}

impl TargetInfo for MockTargets {
    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn image_count(&self) -> u32 {
        IMAGE_COUNT
    }
}

impl Drop for MockTargets {
    fn drop(&mut self) {
        self.state
            .lock()
            .events
            .push(Event::DropTargets(self.generation));
    }
}

#[derive(Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes the `call`-th acquire (1-based) return `script`.
    pub fn script_acquire(&self, call: u32, script: AcquireScript) {
        self.state.lock().acquire_script.insert(call, script);
    }

    /// Makes the `call`-th present (1-based) return the raw `result`.
    pub fn script_present(&self, call: u32, result: Result<bool, vk::Result>) {
        self.state.lock().present_script.insert(call, result);
    }

    /// Makes the `call`-th fence wait (1-based) report a lost device.
    pub fn fail_fence_wait_at(&self, call: u32) {
        self.state.lock().fail_fence_wait_at = Some(call);
    }

    /// Makes the next `queries` surface extent queries report a zero-sized
    /// surface, whatever the window size.
    pub fn hide_surface(&self, queries: u32) {
        self.state.lock().hidden_surface_queries = queries;
    }

    pub fn surface_queries(&self) -> u32 {
        self.state.lock().surface_queries
    }

    pub fn log(&self, event: Event) {
        self.state.lock().events.push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().events.clone()
    }

    pub fn take_events(&self) -> Vec<Event> {
        std::mem::take(&mut self.state.lock().events)
    }

    pub fn count(&self, event: &Event) -> usize {
        self.state
            .lock()
            .events
            .iter()
            .filter(|e| *e == event)
            .count()
    }

    pub fn violations(&self) -> Vec<String> {
        self.state.lock().violations.clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.lock().max_in_flight
    }

    pub fn fence_state(&self, fence: usize) -> FenceState {
        self.state.lock().fences[fence]
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().pending.len()
    }

    fn report(&self, message: String) {
        self.state.lock().violation(message);
    }
}

impl Backend for MockBackend {
    type Fence = MockFence;
    type Semaphore = MockSemaphore;
    type CommandBuffer = MockCommandBuffer;
    type Targets = MockTargets;

    fn create_fence(&self, signaled: bool) -> RhiResult<MockFence> {
        let mut state = self.state.lock();
        let id = state.fences.len();
        state.fences.push(if signaled {
            FenceState::Signaled
        } else {
            FenceState::Unsignaled
        });
        Ok(MockFence(id))
    }

    fn create_semaphore(&self) -> RhiResult<MockSemaphore> {
        let mut state = self.state.lock();
        let id = state.semaphores.len();
        state.semaphores.push(false);
        Ok(MockSemaphore(id))
    }

    fn wait_for_fence(&self, fence: &MockFence) -> RhiResult<()> {
        let mut state = self.state.lock();
        state.fence_waits += 1;
        state.events.push(Event::WaitFence(fence.0));
        if state.fail_fence_wait_at == Some(state.fence_waits) {
            return Err(RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST));
        }
        match state.fences[fence.0] {
            FenceState::Signaled => {}
            FenceState::Pending => state.complete_through(fence.0),
            FenceState::Unsignaled => {
                let message = format!("wait on fence {} that nothing will signal", fence.0);
                state.violation(message);
            }
        }
        Ok(())
    }

    fn reset_fence(&self, fence: &MockFence) -> RhiResult<()> {
        let mut state = self.state.lock();
        state.events.push(Event::ResetFence(fence.0));
        if state.fences[fence.0] == FenceState::Pending {
            let message = format!("reset of pending fence {}", fence.0);
            state.violation(message);
        }
        state.fences[fence.0] = FenceState::Unsignaled;
        Ok(())
    }

    fn allocate_command_buffer(&self) -> RhiResult<MockCommandBuffer> {
        let mut state = self.state.lock();
        let id = state.command_buffers;
        state.command_buffers += 1;
        Ok(MockCommandBuffer(id))
    }

    fn begin_commands(&self, cmd: &MockCommandBuffer) -> RhiResult<()> {
        let mut state = self.state.lock();
        state.events.push(Event::BeginCommands(cmd.0));
        if let Some(&fence) = state.cmd_fence.get(&cmd.0)
            && state.fences[fence] == FenceState::Pending
        {
            let message = format!("command buffer {} re-recorded while pending", cmd.0);
            state.violation(message);
        }
        Ok(())
    }

    fn begin_render_pass(
        &self,
        _cmd: &MockCommandBuffer,
        targets: &MockTargets,
        image_index: u32,
        _clear_color: [f32; 4],
    ) -> RhiResult<()> {
        if image_index >= targets.image_count() {
            return Err(RhiError::InvalidArgument(format!(
                "no framebuffer for image {}",
                image_index
            )));
        }
        self.log(Event::BeginRenderPass(image_index));
        Ok(())
    }

    fn end_render_pass(&self, _cmd: &MockCommandBuffer) {
        self.log(Event::EndRenderPass);
    }

    fn end_commands(&self, _cmd: &MockCommandBuffer) -> RhiResult<()> {
        self.log(Event::EndCommands);
        Ok(())
    }

    fn submit(
        &self,
        cmd: &MockCommandBuffer,
        wait: &MockSemaphore,
        signal: &MockSemaphore,
        fence: &MockFence,
    ) -> RhiResult<()> {
        let mut state = self.state.lock();
        state.events.push(Event::Submit {
            cmd: cmd.0,
            fence: fence.0,
        });

        if state.fences[fence.0] != FenceState::Unsignaled {
            let message = format!("submit with fence {} not reset", fence.0);
            state.violation(message);
        }
        if !std::mem::take(&mut state.semaphores[wait.0]) {
            let message = format!("submit waits on unsignaled semaphore {}", wait.0);
            state.violation(message);
        }
        if std::mem::replace(&mut state.semaphores[signal.0], true) {
            let message = format!("submit signals already signaled semaphore {}", signal.0);
            state.violation(message);
        }

        state.fences[fence.0] = FenceState::Pending;
        state.pending.push(fence.0);
        state.max_in_flight = state.max_in_flight.max(state.pending.len());
        state.cmd_fence.insert(cmd.0, fence.0);
        Ok(())
    }

    fn drawable_extent(&self, framebuffer: vk::Extent2D) -> RhiResult<Option<vk::Extent2D>> {
        let mut state = self.state.lock();
        state.surface_queries += 1;
        if state.hidden_surface_queries > 0 {
            state.hidden_surface_queries -= 1;
            return Ok(None);
        }
        Ok(Some(framebuffer))
    }

    fn create_targets(
        &self,
        extent: vk::Extent2D,
        retired: Option<MockTargets>,
    ) -> RhiResult<MockTargets> {
        if !self.state.lock().pending.is_empty() && retired.is_some() {
            self.report("render targets replaced while work is pending".to_string());
        }
        drop(retired);

        let mut state = self.state.lock();
        if extent.width == 0 || extent.height == 0 {
            return Err(RhiError::SwapchainError(format!(
                "Cannot create a swapchain with extent {}x{}",
                extent.width, extent.height
            )));
        }
        state.generation += 1;
        let generation = state.generation;
        state.events.push(Event::CreateTargets { generation, extent });
        Ok(MockTargets {
            generation,
            extent,
            state: self.state.clone(),
        })
    }

    fn acquire_next_image(
        &self,
        _targets: &MockTargets,
        signal: &MockSemaphore,
    ) -> RhiResult<AcquireOutcome> {
        let mut state = self.state.lock();
        state.acquire_calls += 1;
        let call = state.acquire_calls;
        let image_index = state.next_image % IMAGE_COUNT;

        let raw = match state.acquire_script.get(&call) {
            None => Ok((image_index, false)),
            Some(AcquireScript::Suboptimal) => Ok((image_index, true)),
            Some(AcquireScript::OutOfDate) => Err(vk::Result::ERROR_OUT_OF_DATE_KHR),
            Some(AcquireScript::Error(e)) => Err(*e),
        };

        let outcome = classify_acquire(raw)?;
        match outcome {
            AcquireOutcome::Acquired { image_index, .. } => {
                state.next_image += 1;
                if std::mem::replace(&mut state.semaphores[signal.0], true) {
                    let message = format!("acquire signals already signaled semaphore {}", signal.0);
                    state.violation(message);
                }
                state.events.push(Event::Acquire {
                    image_index: Some(image_index),
                });
            }
            AcquireOutcome::OutOfDate => {
                state.events.push(Event::Acquire { image_index: None });
            }
        }
        Ok(outcome)
    }

    fn present(
        &self,
        _targets: &MockTargets,
        image_index: u32,
        wait: &MockSemaphore,
    ) -> RhiResult<SwapchainStatus> {
        let mut state = self.state.lock();
        state.present_calls += 1;
        let call = state.present_calls;
        state.events.push(Event::Present(image_index));

        if !std::mem::take(&mut state.semaphores[wait.0]) {
            let message = format!("present waits on unsignaled semaphore {}", wait.0);
            state.violation(message);
        }

        let raw = state.present_script.get(&call).copied().unwrap_or(Ok(false));
        classify_present(raw)
    }

    fn wait_idle(&self) -> RhiResult<()> {
        let mut state = self.state.lock();
        state.events.push(Event::WaitIdle);
        let pending = std::mem::take(&mut state.pending);
        for fence in pending {
            state.fences[fence] = FenceState::Signaled;
        }
        Ok(())
    }
}

struct SurfaceInner {
    size: (u32, u32),
    resized: bool,
    /// Sizes revealed by successive `wait_events` calls. Empty means the
    /// surface closes on the next wait.
    plan: VecDeque<(u32, u32)>,
    waits: usize,
}

/// Single-threaded surface whose future is scripted up front.
pub struct MockSurface {
    inner: Mutex<SurfaceInner>,
}

impl MockSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            inner: Mutex::new(SurfaceInner {
                size: (width, height),
                resized: false,
                plan: VecDeque::new(),
                waits: 0,
            }),
        }
    }

    /// Changes the size and raises the resize flag, like a window event.
    pub fn resize(&self, width: u32, height: u32) {
        let mut inner = self.inner.lock();
        inner.size = (width, height);
        inner.resized = true;
    }

    /// Sizes reported after each of the next `wait_events` calls.
    pub fn plan(&self, sizes: &[(u32, u32)]) {
        self.inner.lock().plan.extend(sizes.iter().copied());
    }

    pub fn waits(&self) -> usize {
        self.inner.lock().waits
    }
}

impl SurfaceEvents for MockSurface {
    fn framebuffer_size(&self) -> (u32, u32) {
        self.inner.lock().size
    }

    fn wait_events(&self) -> bool {
        let mut inner = self.inner.lock();
        inner.waits += 1;
        match inner.plan.pop_front() {
            Some(size) => {
                inner.size = size;
                true
            }
            None => false,
        }
    }

    fn take_resized(&self) -> bool {
        std::mem::take(&mut self.inner.lock().resized)
    }
}

/// Hooks that log every call into the backend's event stream.
pub struct RecordingHooks {
    backend: Arc<MockBackend>,
    pub updates: Vec<FrameInfo>,
    pub resizes: Vec<vk::Extent2D>,
    /// Frame number whose scene recording fails.
    pub fail_record_at: Option<u64>,
}

impl RecordingHooks {
    pub fn new(backend: Arc<MockBackend>) -> Self {
        Self {
            backend,
            updates: Vec::new(),
            resizes: Vec::new(),
            fail_record_at: None,
        }
    }
}

impl FrameHooks<MockBackend> for RecordingHooks {
    fn update_frame(&mut self, frame: &FrameInfo) -> RhiResult<()> {
        // Fence ids follow slot order because the sync objects are created
        // slot by slot and nothing else creates fences.
        if self.backend.fence_state(frame.slot) == FenceState::Pending {
            self.backend
                .report(format!("slot {} updated while its work is pending", frame.slot));
        }
        self.backend.log(Event::Update { slot: frame.slot });
        self.updates.push(*frame);
        Ok(())
    }

    fn clear_color(&self, _frame: &FrameInfo) -> [f32; 4] {
        [0.0, 0.0, 0.0, 1.0]
    }

    fn record(&mut self, ctx: &RecordContext<'_, MockBackend>) -> RhiResult<()> {
        if self.fail_record_at == Some(ctx.frame().frame_number) {
            return Err(RhiError::InvalidArgument("scripted record failure".to_string()));
        }
        ctx.backend().log(Event::Record);
        Ok(())
    }

    fn overlay(&mut self, ctx: &RecordContext<'_, MockBackend>) -> RhiResult<()> {
        ctx.backend().log(Event::Overlay);
        Ok(())
    }

    fn on_resize(&mut self, extent: vk::Extent2D) {
        self.backend.log(Event::Resize(extent));
        self.resizes.push(extent);
    }
}
