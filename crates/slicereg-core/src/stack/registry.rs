use std::sync::Arc;

use ndarray::Array2;

use crate::align::phase_correlation::PhaseCorrelationRegistrar;
use crate::align::registrar::{IdentityRegistrar, PyramidRegistrar, Registrar};
use crate::config::{MotionModel, RegistrationConfig, StackConfig};
use crate::error::{RegistrationError, Result};

use super::aligner::{align_stack_with_progress, AlignedStack};

/// Registration methods available by identifier, in insertion order.
#[derive(Clone, Default)]
pub struct MethodRegistry {
    methods: Vec<(String, Arc<dyn Registrar>)>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `identity`, `translation`, `rigid` and `affine`, the last two sharing `config`.
    pub fn with_defaults(config: &RegistrationConfig) -> Self {
        let mut registry = Self::new();
        registry.insert("identity", Arc::new(IdentityRegistrar));
        registry.insert("translation", Arc::new(PhaseCorrelationRegistrar));
        registry.insert(
            "rigid",
            Arc::new(PyramidRegistrar::with_model(MotionModel::Rigid, config)),
        );
        registry.insert(
            "affine",
            Arc::new(PyramidRegistrar::with_model(MotionModel::Affine, config)),
        );
        registry
    }

    /// Add a method, replacing any existing one with the same identifier.
    pub fn insert(&mut self, id: impl Into<String>, registrar: Arc<dyn Registrar>) {
        let id = id.into();
        match self.methods.iter_mut().find(|(existing, _)| *existing == id) {
            Some(slot) => slot.1 = registrar,
            None => self.methods.push((id, registrar)),
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(|(id, _)| id.as_str())
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn Registrar>> {
        self.methods
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, registrar)| Arc::clone(registrar))
            .ok_or_else(|| RegistrationError::UnknownMethod(id.to_string()))
    }

    /// Align `images` with the method named by `config.method`.
    pub fn align(&self, images: &[Array2<f32>], config: &StackConfig) -> Result<AlignedStack> {
        self.align_with_progress(images, config, |_| {})
    }

    pub fn align_with_progress<F>(
        &self,
        images: &[Array2<f32>],
        config: &StackConfig,
        on_image_done: F,
    ) -> Result<AlignedStack>
    where
        F: Fn(usize) + Send + Sync,
    {
        let registrar = self.get(&config.method)?;
        align_stack_with_progress(
            images,
            config.reference_index,
            config.relative,
            registrar.as_ref(),
            &config.pyramid,
            on_image_done,
        )
    }
}

impl std::fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}
