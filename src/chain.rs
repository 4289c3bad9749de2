// src/chain.rs
//
// A chain is an ordered set of images, each a full spin configuration over the
// same geometry. Methods and optimizers refer to images by index.

use crate::error::{EngineError, Result};
use crate::vec3::Vec3;
use crate::vector_field::{all_finite, max_norm_deviation, VectorField};

#[derive(Debug, Clone)]
pub struct Chain {
    images: Vec<VectorField>,
    nos: usize,
}

impl Chain {
    /// `n_images` images of `nos` spins, all along +z.
    pub fn new(n_images: usize, nos: usize) -> Self {
        Self {
            images: vec![vec![[0.0, 0.0, 1.0]; nos]; n_images],
            nos,
        }
    }

    /// Take ownership of existing configurations; all must have the same length.
    pub fn from_images(images: Vec<VectorField>) -> Result<Self> {
        let nos = images.first().map_or(0, |img| img.len());
        if let Some(bad) = images.iter().find(|img| img.len() != nos) {
            return Err(EngineError::SiteCountMismatch {
                expected: nos,
                found: bad.len(),
            });
        }
        Ok(Self { images, nos })
    }

    pub fn n_images(&self) -> usize {
        self.images.len()
    }

    pub fn nos(&self) -> usize {
        self.nos
    }

    pub fn images(&self) -> &[VectorField] {
        &self.images
    }

    pub fn images_mut(&mut self) -> &mut [VectorField] {
        &mut self.images
    }

    pub fn image(&self, idx: usize) -> &[Vec3] {
        &self.images[idx]
    }

    pub fn image_mut(&mut self, idx: usize) -> &mut [Vec3] {
        &mut self.images[idx]
    }

    /// Error out on the first image holding a NaN or infinity.
    pub fn check_finite(&self, stage: &'static str) -> Result<()> {
        match self.images.iter().position(|img| !all_finite(img)) {
            Some(image) => Err(EngineError::NonFinite { stage, image }),
            None => Ok(()),
        }
    }

    /// Largest |1 - |s|| over all images.
    pub fn max_norm_deviation(&self) -> f64 {
        self.images
            .iter()
            .map(|img| max_norm_deviation(img))
            .fold(0.0_f64, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_images_are_rejected() {
        let res = Chain::from_images(vec![vec![[0.0, 0.0, 1.0]; 3], vec![[0.0, 0.0, 1.0]; 2]]);
        assert!(matches!(
            res,
            Err(EngineError::SiteCountMismatch { expected: 3, found: 2 })
        ));
    }

    #[test]
    fn non_finite_image_is_reported() {
        let mut chain = Chain::new(3, 4);
        chain.image_mut(2)[1] = [f64::NAN, 0.0, 0.0];
        match chain.check_finite("test") {
            Err(EngineError::NonFinite { image, .. }) => assert_eq!(image, 2),
            other => panic!("unexpected {:?}", other),
        }
    }
}
