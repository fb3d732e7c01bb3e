//! Render job front end.
//!
//! [`Raytracer::perform`] builds the KD-tree on the calling thread, then hands
//! an immutable [`RenderContext`] to a dispatcher thread which partitions
//! and orders the regions and runs one worker per core over them. Workers
//! poll a shared `running` flag between pixels; the last worker to exit
//! reports the outcome to the sink. A job counts as completed when every
//! region was rendered to its last pixel, whatever the flag says by then.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use lumen_core::Scene;
use lumen_math::{Camera, UVec2};

use crate::context::RenderContext;
use crate::environment::EnvironmentSampler;
use crate::error::{RayTraceError, Result};
use crate::integrator::raytrace_pixel;
use crate::options::RaytraceOptions;
use crate::output::{PixelSink, RenderOutcome};
use crate::overlay::{self, REGION_BORDER_COLOR};
use crate::region::{claim_next, order_regions, partition_regions, Region};
use crate::sampling::stream_rng;
use crate::Color;

/// Lifecycle of the current render job.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Idle = 0,
    Partitioning = 1,
    Ordering = 2,
    Rendering = 3,
    Completed = 4,
    Cancelled = 5,
}

impl RenderState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Partitioning,
            2 => Self::Ordering,
            3 => Self::Rendering,
            4 => Self::Completed,
            5 => Self::Cancelled,
            _ => Self::Idle,
        }
    }
}

/// KD-tree accelerated path tracer running render jobs in the background.
pub struct Raytracer {
    options: RaytraceOptions,
    environment: Option<Arc<dyn EnvironmentSampler>>,
    sink: Arc<dyn PixelSink>,
    running: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    dispatcher: Option<JoinHandle<()>>,
}

impl Raytracer {
    /// Create a ray tracer writing every job's output to `sink`.
    pub fn new(sink: Arc<dyn PixelSink>) -> Self {
        Self {
            options: RaytraceOptions::default(),
            environment: None,
            sink,
            running: Arc::new(AtomicBool::new(false)),
            state: Arc::new(AtomicU8::new(RenderState::Idle as u8)),
            dispatcher: None,
        }
    }

    /// Replace the options used by the next job.
    ///
    /// Invalid options are rejected and the current ones kept.
    pub fn set_options(&mut self, options: RaytraceOptions) -> Result<()> {
        options.validate()?;
        self.options = options;
        Ok(())
    }

    pub fn options(&self) -> &RaytraceOptions {
        &self.options
    }

    /// Set the environment seen by rays leaving the scene; `None` is black.
    pub fn set_environment(&mut self, environment: Option<Arc<dyn EnvironmentSampler>>) {
        self.environment = environment;
    }

    pub fn state(&self) -> RenderState {
        RenderState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// True while a job is partitioning, ordering or rendering.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start rendering `scene` as seen by `camera` into a `viewport` sized image.
    ///
    /// Any job in flight is stopped first. Scene and option errors are
    /// returned before anything is rendered; the render itself happens in
    /// the background and ends with [`PixelSink::render_finished`].
    pub fn perform(&mut self, scene: &Scene, camera: &Camera, viewport: UVec2) -> Result<()> {
        self.stop();

        let ctx = Arc::new(RenderContext::new(
            scene,
            camera,
            viewport,
            &self.options,
            self.environment.clone(),
        )?);

        let job = Job {
            ctx,
            options: self.options.clone(),
            sink: Arc::clone(&self.sink),
            running: Arc::clone(&self.running),
            state: Arc::clone(&self.state),
            started: Instant::now(),
        };

        log::info!(
            "Starting {}x{} render: {} rays per pixel, {} workers",
            viewport.x,
            viewport.y,
            self.options.rays_per_pixel,
            self.options.worker_count()
        );

        self.running.store(true, Ordering::Release);
        job.set_state(RenderState::Partitioning);
        self.dispatcher = Some(thread::spawn(move || job.run()));

        Ok(())
    }

    /// Render one pixel synchronously and return its color.
    ///
    /// Stops any job in flight before rebuilding the tree.
    pub fn perform_at_point(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        viewport: UVec2,
        pixel: UVec2,
    ) -> Result<Color> {
        self.stop();

        if viewport.x == 0 || viewport.y == 0 {
            return Err(RayTraceError::InvalidViewport {
                width: viewport.x,
                height: viewport.y,
            });
        }
        if pixel.x >= viewport.x || pixel.y >= viewport.y {
            return Err(RayTraceError::PixelOutOfBounds {
                x: pixel.x,
                y: pixel.y,
                width: viewport.x,
                height: viewport.y,
            });
        }

        let ctx = RenderContext::new(scene, camera, viewport, &self.options, self.environment.clone())?;
        let stream = Region::new(pixel, UVec2::ONE).stream();
        let mut rng = stream_rng(self.options.seed, stream);

        let (color, bounces) = raytrace_pixel(&ctx, pixel, self.options.rays_per_pixel, &mut rng);
        log::debug!(
            "Pixel ({}, {}): {:?}, up to {} bounces",
            pixel.x,
            pixel.y,
            color,
            bounces
        );

        Ok(color)
    }

    /// Cancel the current job and wait for its threads to exit.
    ///
    /// No pixel is written after this returns.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.dispatcher.take() {
            log::debug!("Stopping render job");
            if handle.join().is_err() {
                log::error!("{}", RayTraceError::WorkerPanicked);
            }
        }
    }

    /// Block until the current job completes on its own.
    pub fn wait(&mut self) -> Result<()> {
        match self.dispatcher.take() {
            Some(handle) => handle.join().map_err(|_| RayTraceError::WorkerPanicked),
            None => Ok(()),
        }
    }
}

impl Drop for Raytracer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State shared by the dispatcher and workers of one job.
struct Job {
    ctx: Arc<RenderContext>,
    options: RaytraceOptions,
    sink: Arc<dyn PixelSink>,
    running: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    started: Instant,
}

impl Job {
    fn set_state(&self, state: RenderState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    fn run(self) {
        let mut regions = partition_regions(self.ctx.viewport, self.options.render_region_size);

        self.set_state(RenderState::Ordering);
        order_regions(
            &self.ctx,
            &mut regions,
            &self.running,
            self.sink.as_ref(),
            self.options.seed,
        );
        log::debug!(
            "Ordered {} regions in {:.2?}",
            regions.len(),
            self.started.elapsed()
        );

        self.set_state(RenderState::Rendering);
        let worker_count = self.options.worker_count();
        let progress = Progress {
            active: AtomicUsize::new(worker_count),
            unfinished: AtomicUsize::new(regions.len()),
        };
        let regions = Mutex::new(regions);

        thread::scope(|scope| {
            for _ in 0..worker_count {
                scope.spawn(|| {
                    let _guard = ActiveWorker {
                        job: &self,
                        progress: &progress,
                    };
                    self.render_regions(&regions, &progress);
                });
            }
        });
    }

    fn render_regions(&self, regions: &Mutex<Vec<Region>>, progress: &Progress) {
        let sink = self.sink.as_ref();

        while self.is_running() {
            let claimed = claim_next(&mut regions.lock().unwrap_or_else(PoisonError::into_inner));
            let Some(region) = claimed else {
                return;
            };

            overlay::draw_region_border(sink, &region, REGION_BORDER_COLOR);

            let mut rng = stream_rng(self.options.seed, region.stream());
            for pixel in region.pixels() {
                if !self.is_running() {
                    return;
                }
                let (color, _) =
                    raytrace_pixel(&self.ctx, pixel, self.options.rays_per_pixel, &mut rng);
                sink.set_pixel(pixel, color.extend(1.0));
            }
            progress.unfinished.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Runs once, on the last worker to exit.
    fn finish(&self, all_regions_rendered: bool) {
        let outcome = if all_regions_rendered {
            RenderOutcome::Completed
        } else {
            RenderOutcome::Cancelled
        };

        if outcome == RenderOutcome::Completed && self.options.render_kd_tree {
            overlay::draw_kd_tree(&self.ctx, self.sink.as_ref());
        }

        self.set_state(match outcome {
            RenderOutcome::Completed => RenderState::Completed,
            RenderOutcome::Cancelled => RenderState::Cancelled,
        });
        self.running.store(false, Ordering::Release);

        log::info!("Render {:?} after {:.2?}", outcome, self.started.elapsed());
        self.sink.render_finished(outcome);
    }
}

/// Worker bookkeeping of one job's render phase.
struct Progress {
    /// Workers that have not exited yet
    active: AtomicUsize,
    /// Regions not yet rendered to their last pixel
    unfinished: AtomicUsize,
}

/// Counts a worker as active until dropped, panicking or not.
struct ActiveWorker<'a> {
    job: &'a Job,
    progress: &'a Progress,
}

impl Drop for ActiveWorker<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.job.running.store(false, Ordering::Release);
        }
        if self.progress.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.job
                .finish(self.progress.unfinished.load(Ordering::Acquire) == 0);
        }
    }
}
