#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod surface;

use std::fmt;

use serde::de::DeserializeOwned;
use surface::{
    BestFitCacheStats, EngineOptions, EvaluationResult, FreeformSag, ProfileSample, Surface,
    SurfaceDescriptor, SurfaceError, SurfaceEvaluator, SurfaceGrid, SurfaceMetrics,
};
use wasm_bindgen::JsError;
use wasm_bindgen::prelude::*;

cfg_if::cfg_if! {
    if #[cfg(all(feature = "console_error_panic_hook", target_arch = "wasm32"))] {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            console_error_panic_hook::set_once();
            init_logger();
        }
    } else {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            init_logger();
        }
    }
}

#[cfg(feature = "debug_logs")]
fn init_logger() {
    use log::LevelFilter;
    use wasm_bindgen_console_logger::DEFAULT_LOGGER;
    if log::set_logger(&DEFAULT_LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
}

#[cfg(not(feature = "debug_logs"))]
fn init_logger() {}

#[cfg(all(feature = "parallel", target_arch = "wasm32"))]
#[wasm_bindgen]
pub async fn initialize_parallel(worker_count: Option<u32>) -> Result<(), JsError> {
    let threads = worker_count
        .map(|count| count.max(1) as usize)
        .or_else(|| {
            std::thread::available_parallelism()
                .map(|value| value.get())
                .ok()
        })
        .unwrap_or(1);

    wasm_bindgen_rayon::init_thread_pool(threads)
        .await
        .map_err(|err| JsError::new(&format!("could not start rayon thread pool: {err}")))
}

/// Public entry point for consumers.
///
/// Surfaces cross the JS boundary as `{ type, parameters }` objects; results
/// come back as plain objects with camelCase fields.
#[wasm_bindgen]
pub struct Engine {
    evaluator: SurfaceEvaluator,
}

impl Default for Engine {
    fn default() -> Self {
        Self::with_options(EngineOptions::default())
    }
}

#[wasm_bindgen]
impl Engine {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Engine {
        Engine::default()
    }

    /// Engine with overridden solver, cache or metrics settings.
    #[wasm_bindgen(js_name = withOptions)]
    pub fn with_options_js(options: JsValue) -> Result<Engine, JsValue> {
        let options: EngineOptions = if options.is_undefined() || options.is_null() {
            EngineOptions::default()
        } else {
            serde_wasm_bindgen::from_value(options).map_err(to_js_error)?
        };
        Ok(Engine::with_options(options))
    }

    /// Evaluates one point. `x`/`y` are only used by freeform surfaces.
    #[wasm_bindgen]
    pub fn evaluate(
        &self,
        surface: JsValue,
        r: f64,
        x: Option<f64>,
        y: Option<f64>,
    ) -> Result<JsValue, JsValue> {
        let surface = surface_from_js(surface)?;
        let point = match (x, y) {
            (None, None) => None,
            (x, y) => Some((x.unwrap_or(0.0), y.unwrap_or(0.0))),
        };
        to_js(&self.evaluator.evaluate(&surface, r, point))
    }

    #[wasm_bindgen]
    pub fn evaluate_metrics(&self, surface: JsValue) -> Result<JsValue, JsValue> {
        let surface = surface_from_js(surface)?;
        to_js(&self.evaluator.evaluate_metrics(&surface))
    }

    #[wasm_bindgen]
    pub fn evaluate_profile(&self, surface: JsValue) -> Result<JsValue, JsValue> {
        let surface = surface_from_js(surface)?;
        to_js(&self.evaluator.evaluate_profile(&surface))
    }

    /// `size × size` grid over the outer aperture; points outside are `null`.
    #[wasm_bindgen]
    pub fn evaluate_grid(&self, surface: JsValue, size: u32) -> Result<JsValue, JsValue> {
        let surface = surface_from_js(surface)?;
        to_js(&self.evaluator.evaluate_grid(&surface, size as usize))
    }

    #[wasm_bindgen]
    pub fn cache_stats(&self) -> Result<JsValue, JsValue> {
        to_js(&self.cache_statistics())
    }

    /// Forgets the cached best-fit sphere of one surface.
    #[wasm_bindgen]
    pub fn invalidate_surface(&self, surface: JsValue) -> Result<bool, JsValue> {
        let surface = surface_from_js(surface)?;
        Ok(self.evaluator.cache().invalidate(&surface.key()))
    }

    /// Drops every cached best-fit sphere and resets the counters.
    #[wasm_bindgen]
    pub fn clear_cache(&self) {
        self.evaluator.cache().clear();
    }
}

impl Engine {
    #[must_use]
    pub fn with_options(options: EngineOptions) -> Self {
        log::debug!("engine created with {options:?}");
        Self {
            evaluator: SurfaceEvaluator::new(options),
        }
    }

    /// Registers the evaluator used for Zernike and Irregular surfaces.
    pub fn set_freeform_evaluator(&mut self, freeform: impl FreeformSag + 'static) {
        self.evaluator.set_freeform(freeform);
    }

    #[must_use]
    pub fn evaluator(&self) -> &SurfaceEvaluator {
        &self.evaluator
    }

    #[must_use]
    pub fn evaluate_descriptor(
        &self,
        descriptor: &SurfaceDescriptor,
        r: f64,
        point: Option<(f64, f64)>,
    ) -> EvaluationResult {
        self.evaluator
            .evaluate(&Surface::from_descriptor(descriptor), r, point)
    }

    #[must_use]
    pub fn metrics(&self, descriptor: &SurfaceDescriptor) -> SurfaceMetrics {
        self.evaluator
            .evaluate_metrics(&Surface::from_descriptor(descriptor))
    }

    #[must_use]
    pub fn profile(&self, descriptor: &SurfaceDescriptor) -> Vec<ProfileSample> {
        self.evaluator
            .evaluate_profile(&Surface::from_descriptor(descriptor))
    }

    #[must_use]
    pub fn grid(&self, descriptor: &SurfaceDescriptor, size: usize) -> SurfaceGrid {
        self.evaluator
            .evaluate_grid(&Surface::from_descriptor(descriptor), size)
    }

    /// Returns whether a sphere was cached for `descriptor`.
    pub fn invalidate(&self, descriptor: &SurfaceDescriptor) -> bool {
        self.evaluator
            .cache()
            .invalidate(&Surface::from_descriptor(descriptor).key())
    }

    #[must_use]
    pub fn cache_statistics(&self) -> BestFitCacheStats {
        self.evaluator.cache().stats()
    }
}

fn surface_from_js(value: JsValue) -> Result<Surface, JsValue> {
    let descriptor: SurfaceDescriptor = from_js(value)?;
    Ok(Surface::from_descriptor(&descriptor))
}

fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(|err| {
        to_js_error(SurfaceError::InvalidDescriptor {
            message: err.to_string(),
        })
    })
}

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(to_js_error)
}

fn to_js_error<E: fmt::Display>(error: E) -> JsValue {
    js_error(&error.to_string())
}

fn js_error(message: &str) -> JsValue {
    #[cfg(target_arch = "wasm32")]
    {
        JsError::new(message).into()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = message;
        JsValue::NULL
    }
}
